//! Tower middleware that guards the MCP endpoint with bearer tokens.
//!
//! Provides [`OAuthLayer`] and [`OAuthService`]. When no resource-server
//! configuration was resolved the service passes every request through.
//! Otherwise each request ends in one of two ways: its [`AuthInfo`](super::AuthInfo) is
//! inserted into the request extensions and the inner service is called, or
//! a 401 with a Bearer challenge is returned and the inner service is never
//! reached.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tower::Layer;

use super::challenge::{ChallengeCode, bearer_challenge};
use super::config::ResourceServerConfig;
use super::diagnostics::{UnverifiedClaims, describe_rejected_token, token_preview};
use super::error::OAuthError;
use super::token::TokenVerifier;

const MISSING_HEADER: &str = "Authorization header with a Bearer token is required.";
const WRONG_SCHEME: &str = "Authorization header must use the Bearer scheme.";
const EMPTY_TOKEN: &str = "Bearer token cannot be empty.";
const UNEXPECTED_FAILURE: &str = "Unable to verify access token.";

/// Tower layer that wraps services with bearer token verification.
///
/// ```rust
/// use neonvideo_mcp::oauth::{JwksVerifier, OAuthLayer};
///
/// // No configuration: authorization is disabled and requests pass through.
/// let layer = OAuthLayer::new(None, JwksVerifier::default());
/// ```
#[derive(Clone)]
pub struct OAuthLayer<V: TokenVerifier> {
    config: Option<Arc<ResourceServerConfig>>,
    verifier: V,
}

impl<V: TokenVerifier> OAuthLayer<V> {
    pub fn new(config: Option<Arc<ResourceServerConfig>>, verifier: V) -> Self {
        Self { config, verifier }
    }
}

impl<S, V: TokenVerifier> Layer<S> for OAuthLayer<V> {
    type Service = OAuthService<S, V>;

    fn layer(&self, inner: S) -> Self::Service {
        OAuthService {
            inner,
            config: self.config.clone(),
            verifier: self.verifier.clone(),
        }
    }
}

/// Tower service created by [`OAuthLayer`].
///
/// For each request:
///
/// 1. Passes through when authorization is not configured
/// 2. Extracts the token from `Authorization: Bearer <token>` (scheme is
///    case-insensitive)
/// 3. Verifies it with the [`TokenVerifier`], which also enforces required
///    scopes
/// 4. On success, injects [`AuthInfo`](super::AuthInfo) into request extensions
/// 5. On failure, returns 401 with `WWW-Authenticate` and `{"error": ...}`
#[derive(Clone)]
pub struct OAuthService<S, V: TokenVerifier> {
    inner: S,
    config: Option<Arc<ResourceServerConfig>>,
    verifier: V,
}

impl<S, V> tower_service::Service<Request<Body>> for OAuthService<S, V>
where
    S: tower_service::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<crate::BoxError> + Send,
    V: TokenVerifier,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let config = self.config.clone();
        let verifier = self.verifier.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(config) = config else {
                return inner.call(req).await;
            };

            tracing::debug!(
                method = %req.method(),
                path = %req.uri().path(),
                auth_header = req.headers().contains_key(header::AUTHORIZATION),
                "checking bearer token"
            );

            let token = match bearer_token(req.headers()) {
                Ok(token) => token,
                Err(description) => {
                    tracing::warn!(reason = description, "rejecting request without usable bearer token");
                    return Ok(unauthorized(
                        &config,
                        ChallengeCode::InvalidRequest,
                        description,
                    ));
                }
            };

            match verifier.verify(&token, &config).await {
                Ok(info) => {
                    tracing::info!(
                        client_id = %info.client_id,
                        scopes = %info.scopes.join(" "),
                        expires_at = ?info.expires_at,
                        "access token verified"
                    );
                    req.extensions_mut().insert(info);
                    inner.call(req).await
                }
                Err(error) => Ok(rejection(&config, &token, &error)),
            }
        })
    }
}

/// Pull the token out of the `Authorization` header, or describe why not.
fn bearer_token(headers: &HeaderMap) -> Result<String, &'static str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(MISSING_HEADER)?
        .to_str()
        .map_err(|_| WRONG_SCHEME)?;

    let (scheme, rest) = value.split_once(' ').ok_or(WRONG_SCHEME)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(WRONG_SCHEME);
    }

    let token = rest.trim();
    if token.is_empty() {
        return Err(EMPTY_TOKEN);
    }
    Ok(token.to_string())
}

/// Map a verification failure to a 401, logging what an operator needs.
fn rejection(config: &ResourceServerConfig, token: &str, error: &OAuthError) -> Response {
    let description = match error {
        OAuthError::InvalidToken { detail } => {
            let claims = UnverifiedClaims::peek(token).unwrap_or_default();
            tracing::warn!(
                code = error.code(),
                detail = %detail,
                token = %token_preview(token),
                iss = ?claims.iss,
                aud = ?claims.aud,
                exp = ?claims.exp,
                "access token verification failed"
            );
            format!(
                "Access token could not be verified ({}).",
                describe_rejected_token(token)
            )
        }
        OAuthError::InsufficientScope { missing } => {
            tracing::warn!(
                code = error.code(),
                missing = %missing.join(" "),
                "access token lacks required scopes"
            );
            format!(
                "Access token does not include required NeonVideo scopes (missing: {}).",
                missing.join(" ")
            )
        }
        OAuthError::MissingToken => {
            tracing::warn!(code = error.code(), "access token verification failed");
            EMPTY_TOKEN.to_string()
        }
        OAuthError::Configuration { .. } => {
            tracing::error!(error = %error, "unexpected error verifying access token");
            UNEXPECTED_FAILURE.to_string()
        }
    };

    unauthorized(config, error.challenge_code(), &description)
}

/// Build a 401 response with a Bearer challenge and `{"error": description}`.
pub fn unauthorized(
    config: &ResourceServerConfig,
    code: ChallengeCode,
    description: &str,
) -> Response {
    let challenge = bearer_challenge(config, Some(code), Some(description));
    let body = serde_json::json!({ "error": description });

    let mut response = (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
    match HeaderValue::from_str(&challenge) {
        Ok(value) => {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        Err(e) => {
            tracing::error!(error = %e, challenge = %challenge, "unrepresentable challenge header");
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
    }
    response
}
