//! HTTP client for the NeonVideo video-generation API.
//!
//! One call per tool invocation, bounded by a timeout that covers both the
//! request and reading the body. No retries.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use url::Url;

use crate::secret::SecretString;

/// Create endpoint, relative to the API base URL.
pub const CREATE_PATH: &str = "api/neon-single-prompt";

/// Status endpoint prefix, relative to the API base URL. The project id is
/// appended as a path segment.
pub const STATUS_PATH: &str = "api/neon-single-prompt/status";

const USER_AGENT: &str = concat!("neonvideo-mcp/", env!("CARGO_PKG_VERSION"));

/// Credentials forwarded to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<SecretString>,
    pub cookie: Option<SecretString>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.cookie.is_none()
    }

    /// Request headers: JSON content type, `Authorization: Bearer` and
    /// `Cookie: auth_token=`, adding each prefix only when it is missing.
    pub fn headers(&self) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            let token = token.expose();
            let value = if token.starts_with("Bearer ") {
                token.to_string()
            } else {
                format!("Bearer {}", token)
            };
            headers.insert(AUTHORIZATION, sensitive(&value, "Authorization")?);
        }

        if let Some(cookie) = &self.cookie {
            let cookie = cookie.expose();
            let value = if cookie.contains("auth_token=") {
                cookie.to_string()
            } else {
                format!("auth_token={}", cookie)
            };
            headers.insert(COOKIE, sensitive(&value, "Cookie")?);
        }

        Ok(headers)
    }
}

fn sensitive(value: &str, name: &'static str) -> Result<HeaderValue, BackendError> {
    let mut value = HeaderValue::from_str(value).map_err(|_| BackendError::InvalidHeader(name))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Failure to obtain any HTTP response from the backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request timed out after {0} ms")]
    Timeout(u128),

    #[error("NeonVideo API request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("{0} credential contains characters that are not allowed in an HTTP header")]
    InvalidHeader(&'static str),
}

/// A backend response, successful or not.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`, or empty.
    pub reason: String,
    pub body: String,
    /// The body parsed as a JSON object, when it is one.
    pub json: Option<Map<String, Value>>,
}

impl BackendResponse {
    fn new(status: reqwest::StatusCode, body: String) -> Self {
        let json = if body.is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(&body) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            }
        };
        Self {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
            json,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The payload when the call succeeded and returned a JSON object.
    pub fn payload(&self) -> Option<&Map<String, Value>> {
        if self.is_success() {
            self.json.as_ref()
        } else {
            None
        }
    }

    /// The payload's `error` string, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.json.as_ref()?.get("error")?.as_str()
    }

    /// 401 and 403 mean the backend refused the credential.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

/// Client for the NeonVideo API.
#[derive(Debug, Clone)]
pub struct VideoApiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl VideoApiClient {
    pub fn new(base_url: Url, timeout: Duration) -> crate::Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_client(http, base_url, timeout))
    }

    pub fn with_client(http: reqwest::Client, mut base_url: Url, timeout: Duration) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn create_url(&self) -> Url {
        self.endpoint(CREATE_PATH)
    }

    /// Absolute status URL for a project. The id is percent-encoded as one
    /// path segment.
    pub fn status_url(&self, project_id: &str) -> Url {
        let mut url = self.endpoint(STATUS_PATH);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(project_id);
        }
        url
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}{}", url.path(), path);
        url.set_path(&joined);
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// `POST {base}/api/neon-single-prompt` with `{"prompt": ...}`.
    pub async fn create_project(
        &self,
        prompt: &str,
        credentials: &Credentials,
    ) -> Result<BackendResponse, BackendError> {
        let request = self
            .http
            .post(self.create_url())
            .headers(credentials.headers()?)
            .json(&serde_json::json!({ "prompt": prompt }));
        self.send(request, "generate_video").await
    }

    /// `GET {base}/api/neon-single-prompt/status/{id}`.
    pub async fn project_status(
        &self,
        project_id: &str,
        credentials: &Credentials,
    ) -> Result<BackendResponse, BackendError> {
        let request = self
            .http
            .get(self.status_url(project_id))
            .headers(credentials.headers()?);
        self.send(request, "check_status").await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<BackendResponse, BackendError> {
        let started = Instant::now();
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let outcome = tokio::time::timeout(self.timeout, exchange).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (status, body) = match outcome {
            Ok(Ok(exchange)) => exchange,
            Ok(Err(e)) => {
                tracing::error!(operation, elapsed_ms, error = %e, "backend request failed");
                return Err(BackendError::Transport(e));
            }
            Err(_) => {
                tracing::error!(
                    operation,
                    elapsed_ms,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "backend request timed out"
                );
                return Err(BackendError::Timeout(self.timeout.as_millis()));
            }
        };

        tracing::debug!(operation, status = status.as_u16(), elapsed_ms, "backend responded");
        Ok(BackendResponse::new(status, body))
    }
}
