//! Unverified token inspection for logs and error descriptions.
//!
//! Nothing in this module checks a signature. Its output is only ever
//! formatted into log lines and the `error_description` of a rejection, and
//! it must never feed an authorization decision. It accepts any input,
//! including strings that are not JWTs at all.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

/// Shorten a token to its first 12 and last 8 characters.
pub fn token_preview(token: &str) -> String {
    if token.is_empty() {
        return "<empty>".to_string();
    }
    let chars: Vec<char> = token.chars().collect();
    let lead: String = chars.iter().take(12).collect();
    let tail: String = chars[chars.len().saturating_sub(8)..].iter().collect();
    format!("{}...{}", lead, tail)
}

/// Claims recovered from a token's payload without verification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnverifiedClaims {
    pub iss: Option<String>,
    pub aud: Option<Value>,
    pub exp: Option<i64>,
}

impl UnverifiedClaims {
    /// Decode the payload segment of a compact JWS. Returns `None` when the
    /// token is not three segments of base64url JSON.
    pub fn peek(token: &str) -> Option<Self> {
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return None;
        };

        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: Map<String, Value> = serde_json::from_slice(&bytes).ok()?;

        Some(Self {
            iss: claims.get("iss").and_then(Value::as_str).map(str::to_string),
            aud: claims.get("aud").filter(|v| !v.is_null()).cloned(),
            exp: claims.get("exp").and_then(Value::as_i64),
        })
    }
}

/// Describe a token that failed verification, for operators.
///
/// Shape: `token=<preview>; iss=<iss>; aud=<json>; exp=<exp>`, or with every
/// claim `unknown` when the payload cannot be decoded.
pub fn describe_rejected_token(token: &str) -> String {
    let preview = token_preview(token);
    match UnverifiedClaims::peek(token) {
        Some(claims) => format!(
            "token={}; iss={}; aud={}; exp={}",
            preview,
            claims.iss.as_deref().unwrap_or("undefined"),
            claims.aud.unwrap_or(Value::Null),
            claims
                .exp
                .map(|exp| exp.to_string())
                .unwrap_or_else(|| "undefined".to_string()),
        ),
        None => format!("token={}; iss=unknown; aud=unknown; exp=unknown", preview),
    }
}
