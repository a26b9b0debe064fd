//! RFC 6750 `WWW-Authenticate` challenge construction.

use std::fmt;

use super::config::ResourceServerConfig;

/// The `error` parameter of a Bearer challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeCode {
    InvalidRequest,
    InvalidToken,
    InsufficientScope,
}

impl ChallengeCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeCode::InvalidRequest => "invalid_request",
            ChallengeCode::InvalidToken => "invalid_token",
            ChallengeCode::InsufficientScope => "insufficient_scope",
        }
    }
}

impl fmt::Display for ChallengeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a `Bearer` challenge for this resource.
///
/// Parameters appear in a fixed order: `authorization_uri`, `realm`, then
/// `scope` when required scopes are configured, then `error` and
/// `error_description` when supplied.
pub fn bearer_challenge(
    config: &ResourceServerConfig,
    error: Option<ChallengeCode>,
    description: Option<&str>,
) -> String {
    let mut parts = vec![
        param("authorization_uri", config.metadata_url().as_str()),
        param("realm", config.resource_indicator()),
    ];

    if !config.required_scopes().is_empty() {
        parts.push(param("scope", &config.required_scopes().join(" ")));
    }

    if let Some(error) = error {
        parts.push(param("error", error.as_str()));
    }

    if let Some(description) = description {
        parts.push(param("error_description", description));
    }

    format!("Bearer {}", parts.join(", "))
}

// Double quotes become single quotes so values never need escaping, and
// control characters are dropped so the result is always a valid header value.
fn param(name: &str, value: &str) -> String {
    let value: String = value
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '"' { '\'' } else { c })
        .collect();
    format!("{}=\"{}\"", name, value)
}
