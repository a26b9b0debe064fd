//! Process-wide application context.
//!
//! Built once at startup and shared behind an `Arc` by the HTTP routes, the
//! authorization middleware and the action dispatcher. It holds everything
//! that would otherwise be a global: the resolved OAuth configuration (or
//! its absence), the key-set cache, the backend client and the fallback
//! credentials.

use std::sync::Arc;

use crate::action::VideoApiClient;
use crate::action::backend::Credentials;
use crate::oauth::{ChallengeCode, JwksVerifier, ResourceServerConfig, bearer_challenge};

#[derive(Debug, Clone)]
pub struct AppContext {
    oauth: Option<Arc<ResourceServerConfig>>,
    verifier: JwksVerifier,
    backend: VideoApiClient,
    fallback: Credentials,
}

impl AppContext {
    pub fn new(
        oauth: Option<ResourceServerConfig>,
        backend: VideoApiClient,
        fallback: Credentials,
    ) -> Self {
        Self {
            oauth: oauth.map(Arc::new),
            verifier: JwksVerifier::default(),
            backend,
            fallback,
        }
    }

    /// The resolved configuration, `None` when authorization is disabled.
    pub fn oauth(&self) -> Option<&Arc<ResourceServerConfig>> {
        self.oauth.as_ref()
    }

    pub fn oauth_enabled(&self) -> bool {
        self.oauth.is_some()
    }

    pub fn verifier(&self) -> &JwksVerifier {
        &self.verifier
    }

    pub fn backend(&self) -> &VideoApiClient {
        &self.backend
    }

    /// Process-wide token and cookie from the environment.
    pub fn fallback(&self) -> &Credentials {
        &self.fallback
    }

    /// A Bearer challenge, or `None` when authorization is disabled.
    pub fn challenge(&self, code: ChallengeCode, description: &str) -> Option<String> {
        self.oauth
            .as_deref()
            .map(|config| bearer_challenge(config, Some(code), Some(description)))
    }
}
