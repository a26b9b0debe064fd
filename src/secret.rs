//! Redacting wrapper for credentials.
//!
//! Bearer tokens arrive from three places (the `Authorization` header, the
//! `authToken` tool argument, and the process-wide fallback) and a session
//! cookie may be configured as well. All of them travel through the server as
//! [`SecretString`] so that `Debug` output of requests, settings and
//! [`AuthInfo`](crate::oauth::AuthInfo) never prints the credential itself.
//!
//! ```rust
//! use neonvideo_mcp::SecretString;
//!
//! let token = SecretString::with_label("eyJhbGciOi...", "BEARER");
//! assert_eq!(format!("{:?}", token), "[BEARER]");
//! assert_eq!(token.expose(), "eyJhbGciOi...");
//! ```

use std::borrow::Cow;
use std::fmt::{self, Debug, Display, Formatter};

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DEFAULT_LABEL: &str = "REDACTED";

/// A string whose `Debug` and `Display` output is a redaction label.
///
/// Serializes and deserializes as a plain JSON string, so it can be used
/// directly in tool argument types.
#[derive(Clone)]
pub struct SecretString {
    value: String,
    label: Cow<'static, str>,
}

impl SecretString {
    /// Wrap a value with the default `[REDACTED]` label.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: Cow::Borrowed(DEFAULT_LABEL),
        }
    }

    /// Wrap a value with a custom label, shown as `[LABEL]`.
    pub fn with_label(value: impl Into<String>, label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Trim `value` and wrap it, or return `None` when nothing is left.
    ///
    /// Blank environment variables and blank tool arguments are treated as
    /// absent throughout the server.
    pub fn non_blank(
        value: Option<&str>,
        label: impl Into<Cow<'static, str>>,
    ) -> Option<Self> {
        let trimmed = value?.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self::with_label(trimmed, label))
        }
    }

    /// The underlying credential. Do not log the returned value.
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// The redaction label.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl Debug for SecretString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.label)
    }
}

impl Display for SecretString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.label)
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl JsonSchema for SecretString {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("SecretString")
    }

    fn inline_schema() -> bool {
        true
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({ "type": "string" })
    }
}
