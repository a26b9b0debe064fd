//! OAuth resource-server error taxonomy.
//!
//! Request-scoped failures (`missing_token`, `invalid_token`,
//! `insufficient_scope`) are always answered with HTTP 401 and a Bearer
//! challenge. `configuration` failures only happen while resolving settings
//! at startup and abort the process.

use std::fmt;

use super::challenge::ChallengeCode;

/// OAuth resource-server error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// The token passed to the verifier was empty or whitespace.
    MissingToken,

    /// Signature, issuer, audience or expiry checks failed, or the token is
    /// malformed. `detail` holds the underlying reason for logs only; it is
    /// never sent to the caller.
    InvalidToken {
        /// Underlying verification failure.
        detail: String,
    },

    /// The token verified but lacks one or more required scopes.
    InsufficientScope {
        /// Required scopes absent from the token, in configured order.
        missing: Vec<String>,
    },

    /// A URL-valued setting did not parse as an absolute URL with a host.
    Configuration {
        /// Name of the offending setting.
        field: String,
        /// The value as supplied.
        value: String,
        /// Underlying parse failure.
        reason: String,
    },
}

impl OAuthError {
    pub fn invalid_token(detail: impl Into<String>) -> Self {
        OAuthError::InvalidToken {
            detail: detail.into(),
        }
    }

    pub fn invalid_url(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        OAuthError::Configuration {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::MissingToken => "missing_token",
            OAuthError::InvalidToken { .. } => "invalid_token",
            OAuthError::InsufficientScope { .. } => "insufficient_scope",
            OAuthError::Configuration { .. } => "configuration",
        }
    }

    /// The `error` parameter used in the Bearer challenge for this failure.
    ///
    /// Anything that is neither a missing token nor a scope problem is
    /// reported as `invalid_token`.
    pub fn challenge_code(&self) -> ChallengeCode {
        match self {
            OAuthError::MissingToken => ChallengeCode::InvalidRequest,
            OAuthError::InsufficientScope { .. } => ChallengeCode::InsufficientScope,
            OAuthError::InvalidToken { .. } | OAuthError::Configuration { .. } => {
                ChallengeCode::InvalidToken
            }
        }
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthError::MissingToken => write!(f, "Missing access token"),
            OAuthError::InvalidToken { detail } => {
                write!(f, "Invalid access token: {}", detail)
            }
            OAuthError::InsufficientScope { missing } => write!(
                f,
                "Access token is missing required scope(s): {}",
                missing.join(", ")
            ),
            OAuthError::Configuration {
                field,
                value,
                reason,
            } => write!(f, "Invalid URL for {}: {} ({})", field, value, reason),
        }
    }
}

impl std::error::Error for OAuthError {}
