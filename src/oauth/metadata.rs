//! Protected Resource Metadata (RFC 9728 Section 3).
//!
//! The document served at `/.well-known/oauth-protected-resource` so OAuth
//! clients can discover which authorization server issues tokens for this
//! resource and which scopes to request.

use serde::{Deserialize, Serialize};

use super::config::ResourceServerConfig;
use super::scope::unique_scopes;

/// Protected Resource Metadata document.
///
/// Fields that are not configured are omitted from the JSON entirely rather
/// than serialized as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The resource indicator.
    pub resource: String,

    /// Issuers that can mint tokens for this resource.
    pub authorization_servers: Vec<String>,

    /// Scopes every token must carry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_scopes: Vec<String>,

    /// Required and optional scopes, deduplicated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_documentation: Option<String>,
}

impl ProtectedResourceMetadata {
    /// Build the document from a resolved configuration.
    pub fn from_config(config: &ResourceServerConfig) -> Self {
        let supported = unique_scopes(
            config
                .required_scopes()
                .iter()
                .chain(config.optional_scopes())
                .map(String::as_str),
        );

        Self {
            resource: config.resource_indicator().to_string(),
            authorization_servers: vec![config.issuer().to_string()],
            resource_scopes: config.required_scopes().to_vec(),
            scopes_supported: supported,
            authorization_endpoint: config.authorization_endpoint().map(str::to_string),
            token_endpoint: config.token_endpoint().map(str::to_string),
            registration_endpoint: config.registration_endpoint().map(str::to_string),
            resource_documentation: config.resource_documentation().map(str::to_string),
        }
    }
}
