//! Access token verification.
//!
//! Provides the [`TokenVerifier`] trait and [`JwksVerifier`], which checks a
//! JWT against the issuer's remote key set and turns its claims into an
//! [`AuthInfo`].

use std::future::Future;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use serde_json::{Map, Value};
use url::Url;

use super::config::ResourceServerConfig;
use super::error::OAuthError;
use super::jwks::KeySetCache;
use super::scope::{ScopeRequirement, extract_scopes};
use crate::secret::SecretString;

/// Client identifier used when a token names none.
pub const UNKNOWN_CLIENT: &str = "unknown-client";

/// Claims checked, in order, for the client identifier.
const CLIENT_ID_CLAIMS: [&str; 3] = ["azp", "client_id", "clientId"];

/// The identity behind a verified request.
///
/// Built fresh on every successful verification and attached to that request
/// only.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    /// The raw bearer token.
    pub token: SecretString,
    /// From `azp`, `client_id` or `clientId`, else [`UNKNOWN_CLIENT`].
    pub client_id: String,
    /// Scopes merged from every scope claim, first-seen order.
    pub scopes: Vec<String>,
    /// The `exp` claim, in seconds since the epoch.
    pub expires_at: Option<u64>,
    /// The resource indicator the token was verified for.
    pub resource: Url,
    /// `claims` holds the full decoded claim set; `subject` the `sub` claim
    /// when present.
    pub extra: Map<String, Value>,
}

impl AuthInfo {
    fn from_claims(token: &str, claims: Map<String, Value>, resource: &Url) -> Self {
        let scopes = extract_scopes(&claims);
        let client_id = CLIENT_ID_CLAIMS
            .iter()
            .filter_map(|name| claims.get(*name).and_then(Value::as_str))
            .map(str::trim)
            .find(|id| !id.is_empty())
            .unwrap_or(UNKNOWN_CLIENT)
            .to_string();
        let expires_at = claims.get("exp").and_then(Value::as_u64);

        let mut extra = Map::new();
        if let Some(sub) = claims.get("sub").filter(|sub| !sub.is_null()) {
            extra.insert("subject".to_string(), sub.clone());
        }
        extra.insert("claims".to_string(), Value::Object(claims));

        Self {
            token: SecretString::with_label(token, "BEARER"),
            client_id,
            scopes,
            expires_at,
            resource: resource.clone(),
            extra,
        }
    }

    /// The `sub` claim, if the token carried one as a string.
    pub fn subject(&self) -> Option<&str> {
        self.extra.get("subject").and_then(Value::as_str)
    }
}

/// Trait for verifying bearer tokens against a resource-server configuration.
///
/// The authorization middleware is generic over this trait so that tests can
/// substitute a verifier that does not need a key server.
pub trait TokenVerifier: Clone + Send + Sync + 'static {
    /// Verify `token` and return the identity behind it.
    ///
    /// Fails with [`OAuthError::MissingToken`] for an empty token,
    /// [`OAuthError::InsufficientScope`] when a required scope is absent, and
    /// [`OAuthError::InvalidToken`] for everything else.
    fn verify(
        &self,
        token: &str,
        config: &ResourceServerConfig,
    ) -> impl Future<Output = Result<AuthInfo, OAuthError>> + Send;
}

/// JWT verifier backed by the issuer's remote JSON Web Key Set.
///
/// Signature, `iss` (exact string match), `aud` and, when present, `exp` are
/// checked. Only asymmetric algorithms are accepted.
#[derive(Debug, Clone, Default)]
pub struct JwksVerifier {
    key_sets: KeySetCache,
}

impl JwksVerifier {
    pub fn new(key_sets: KeySetCache) -> Self {
        Self { key_sets }
    }

    pub fn key_sets(&self) -> &KeySetCache {
        &self.key_sets
    }

    fn validation(alg: Algorithm, config: &ResourceServerConfig) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_issuer(&[config.issuer()]);
        validation.set_audience(&[config.expected_audience()]);
        // OAuth access tokens may omit exp; iss and aud must be present.
        validation.set_required_spec_claims(&["iss", "aud"]);
        validation.leeway = 0;
        validation
    }
}

impl TokenVerifier for JwksVerifier {
    async fn verify(
        &self,
        token: &str,
        config: &ResourceServerConfig,
    ) -> Result<AuthInfo, OAuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(OAuthError::MissingToken);
        }

        let header = jsonwebtoken::decode_header(token).map_err(map_jwt_error)?;
        if !is_asymmetric(header.alg) {
            return Err(OAuthError::invalid_token(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let key = self
            .key_sets
            .get(config.jwks_uri())
            .decoding_key(&header)
            .await
            .map_err(|e| OAuthError::invalid_token(e.to_string()))?;

        let data = jsonwebtoken::decode::<Map<String, Value>>(
            token,
            &key,
            &Self::validation(header.alg, config),
        )
        .map_err(map_jwt_error)?;

        let info = AuthInfo::from_claims(token, data.claims, config.resource_url());
        ScopeRequirement::new(config.required_scopes().to_vec()).check(&info.scopes)?;

        Ok(info)
    }
}

fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> OAuthError {
    let detail = match e.kind() {
        ErrorKind::ExpiredSignature => "token has expired".to_string(),
        ErrorKind::InvalidAudience => "token audience does not match".to_string(),
        ErrorKind::InvalidIssuer => "token issuer does not match".to_string(),
        ErrorKind::InvalidSignature => "signature verification failed".to_string(),
        ErrorKind::ImmatureSignature => "token is not yet valid".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => format!("missing required claim {}", claim),
        _ => e.to_string(),
    };
    OAuthError::invalid_token(detail)
}
