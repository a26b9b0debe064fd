//! Remote JSON Web Key Sets and the per-URI key set cache.
//!
//! A [`RemoteKeySet`] fetches its keys lazily on the first verification and
//! refreshes them when they are older than [`MAX_AGE`], or when a token names
//! a `kid` the cached set does not contain (at most once per [`COOLDOWN`]).
//! A failed download also starts a [`COOLDOWN`], during which the last good
//! keys keep serving.
//!
//! [`KeySetCache`] hands out one `RemoteKeySet` per JWKS URI for the life of
//! the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use tokio::time::Instant;
use url::Url;

/// Upper bound on a single key set download.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum time between refetches triggered by an unknown `kid`.
pub const COOLDOWN: Duration = Duration::from_secs(30);

/// Keys older than this are refetched before use.
pub const MAX_AGE: Duration = Duration::from_secs(600);

/// Failure to produce a decoding key for a token.
#[derive(Debug, thiserror::Error)]
pub enum KeySetError {
    #[error("failed to fetch key set from {uri}: {source}")]
    Fetch {
        uri: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("key set from {0} is unavailable after a recent fetch failure")]
    Unavailable(Url),

    #[error("no key in the key set matches kid {0:?}")]
    NoMatchingKey(Option<String>),

    #[error("token has no kid and the key set holds {0} compatible keys")]
    AmbiguousKey(usize),

    #[error("unusable key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

#[derive(Default)]
struct KeySetState {
    current: Option<CachedKeys>,
    failed_at: Option<Instant>,
}

impl KeySetState {
    fn may_fetch(&self, cooldown: Duration) -> bool {
        self.failed_at.is_none_or(|at| at.elapsed() >= cooldown)
    }
}

/// A key set published at a remote URI.
pub struct RemoteKeySet {
    uri: Url,
    client: reqwest::Client,
    max_age: Duration,
    cooldown: Duration,
    // Held across the fetch so concurrent misses wait for one download.
    state: tokio::sync::Mutex<KeySetState>,
}

impl std::fmt::Debug for RemoteKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteKeySet")
            .field("uri", &self.uri.as_str())
            .finish_non_exhaustive()
    }
}

impl RemoteKeySet {
    /// Create a key set for `uri`. Nothing is fetched until the first
    /// call to [`decoding_key`](Self::decoding_key).
    pub fn new(uri: Url, client: reqwest::Client) -> Self {
        Self {
            uri,
            client,
            max_age: MAX_AGE,
            cooldown: COOLDOWN,
            state: tokio::sync::Mutex::default(),
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Find the key that should verify a token with this header.
    ///
    /// A failed download is not retried for [`COOLDOWN`]. During that window
    /// previously fetched keys keep serving, and callers with nothing cached
    /// get [`KeySetError::Unavailable`] without touching the network.
    pub async fn decoding_key(&self, header: &Header) -> Result<DecodingKey, KeySetError> {
        let mut state = self.state.lock().await;

        let stale = state
            .current
            .as_ref()
            .is_none_or(|c| c.fetched_at.elapsed() >= self.max_age);
        if stale && state.may_fetch(self.cooldown) {
            match self.fetch().await {
                Ok(fresh) => {
                    state.current = Some(fresh);
                    state.failed_at = None;
                }
                Err(err) => {
                    state.failed_at = Some(Instant::now());
                    if state.current.is_none() {
                        return Err(err);
                    }
                    tracing::warn!(uri = %self.uri, error = %err, "key set refresh failed, keeping cached keys");
                }
            }
        }

        let Some(current) = state.current.as_ref() else {
            return Err(KeySetError::Unavailable(self.uri.clone()));
        };
        let selected = select_key(&current.keys, header);
        let refetch = current.fetched_at.elapsed() >= self.cooldown;
        match selected {
            Err(KeySetError::NoMatchingKey(Some(kid)))
                if refetch && state.may_fetch(self.cooldown) =>
            {
                tracing::debug!(uri = %self.uri, kid = %kid, "unknown kid, refetching key set");
                match self.fetch().await {
                    Ok(refreshed) => {
                        let key = select_key(&refreshed.keys, header);
                        state.current = Some(refreshed);
                        state.failed_at = None;
                        key
                    }
                    Err(err) => {
                        state.failed_at = Some(Instant::now());
                        Err(err)
                    }
                }
            }
            other => other,
        }
    }

    async fn fetch(&self) -> Result<CachedKeys, KeySetError> {
        let started = Instant::now();
        let keys = self
            .client
            .get(self.uri.clone())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| self.fetch_error(source))?
            .json::<JwkSet>()
            .await
            .map_err(|source| self.fetch_error(source))?;

        tracing::info!(
            uri = %self.uri,
            keys = keys.keys.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched key set"
        );

        Ok(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        })
    }

    fn fetch_error(&self, source: reqwest::Error) -> KeySetError {
        KeySetError::Fetch {
            uri: self.uri.clone(),
            source,
        }
    }
}

/// Pick the key for a token: by `kid` when the token names one, otherwise
/// the single signing key whose type fits the token's algorithm.
fn select_key(keys: &JwkSet, header: &Header) -> Result<DecodingKey, KeySetError> {
    let jwk = match header.kid.as_deref() {
        Some(kid) => keys
            .find(kid)
            .filter(|jwk| is_compatible(jwk, header.alg))
            .ok_or_else(|| KeySetError::NoMatchingKey(Some(kid.to_string())))?,
        None => {
            let candidates: Vec<&Jwk> = keys
                .keys
                .iter()
                .filter(|jwk| is_compatible(jwk, header.alg))
                .collect();
            match candidates.as_slice() {
                [only] => *only,
                [] => return Err(KeySetError::NoMatchingKey(None)),
                many => return Err(KeySetError::AmbiguousKey(many.len())),
            }
        }
    };

    Ok(DecodingKey::from_jwk(jwk)?)
}

fn is_compatible(jwk: &Jwk, alg: Algorithm) -> bool {
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return false;
    }

    match (&jwk.algorithm, alg) {
        (
            AlgorithmParameters::RSA(_),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512,
        ) => true,
        (AlgorithmParameters::EllipticCurve(_), Algorithm::ES256 | Algorithm::ES384) => true,
        (AlgorithmParameters::OctetKeyPair(_), Algorithm::EdDSA) => true,
        _ => false,
    }
}

/// One [`RemoteKeySet`] per JWKS URI, shared by every request.
///
/// Cloning is cheap; clones share the same map.
#[derive(Clone, Default)]
pub struct KeySetCache {
    client: reqwest::Client,
    sets: Arc<Mutex<HashMap<String, Arc<RemoteKeySet>>>>,
}

impl KeySetCache {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            sets: Arc::default(),
        }
    }

    /// The key set for `jwks_uri`, created on first use. Repeated calls with
    /// the same URI return the same instance.
    pub fn get(&self, jwks_uri: &Url) -> Arc<RemoteKeySet> {
        let mut sets = self.sets.lock().unwrap_or_else(PoisonError::into_inner);
        sets.entry(jwks_uri.as_str().to_string())
            .or_insert_with(|| {
                tracing::debug!(uri = %jwks_uri, "creating remote key set");
                Arc::new(RemoteKeySet::new(jwks_uri.clone(), self.client.clone()))
            })
            .clone()
    }

    /// Number of distinct key sets created so far.
    pub fn len(&self) -> usize {
        self.sets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("sets", &self.len())
            .finish()
    }
}
