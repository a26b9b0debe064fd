//! Resource-server configuration.
//!
//! [`resolve`] turns raw settings into a validated [`ResourceServerConfig`].
//! It is a pure function of its input: nothing is fetched, and the same
//! settings always produce the same result.
//!
//! Authorization is opt-in. When either the issuer or the resource indicator
//! is missing, `resolve` returns `Ok(None)` and the server runs without OAuth.
//! Any other malformed input is an error so that a typo can never silently
//! disable authorization.

use clap::Args;
use url::Url;

use super::error::OAuthError;
use super::scope::{split_scopes, unique_scopes};

/// Path of the RFC 9728 protected-resource metadata document.
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// Path of the key set, relative to the issuer, when no override is given.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

const ISSUER_FIELD: &str = "NEONVIDEO_OAUTH_ISSUER_URL";
const RESOURCE_FIELD: &str = "NEONVIDEO_OAUTH_RESOURCE";
const JWKS_FIELD: &str = "NEONVIDEO_OAUTH_JWKS_URL";
const AUTHORIZATION_ENDPOINT_FIELD: &str = "NEONVIDEO_OAUTH_AUTHORIZATION_ENDPOINT";
const TOKEN_ENDPOINT_FIELD: &str = "NEONVIDEO_OAUTH_TOKEN_ENDPOINT";
const REGISTRATION_ENDPOINT_FIELD: &str = "NEONVIDEO_OAUTH_REGISTRATION_ENDPOINT";
const RESOURCE_DOCUMENTATION_FIELD: &str = "NEONVIDEO_OAUTH_RESOURCE_DOCUMENTATION";

/// Raw OAuth settings, as read from flags or the environment.
///
/// Every field is optional and blank values count as absent.
#[derive(Debug, Clone, Default, Args)]
pub struct OAuthSettings {
    /// Trusted token issuer
    #[arg(long = "oauth-issuer-url", env = "NEONVIDEO_OAUTH_ISSUER_URL")]
    pub issuer_url: Option<String>,

    /// Canonical URL of this protected resource
    #[arg(long = "oauth-resource", env = "NEONVIDEO_OAUTH_RESOURCE")]
    pub resource: Option<String>,

    /// Key set URL (defaults to {issuer}/.well-known/jwks.json)
    #[arg(long = "oauth-jwks-url", env = "NEONVIDEO_OAUTH_JWKS_URL")]
    pub jwks_url: Option<String>,

    /// Scopes every token must carry (space or comma separated)
    #[arg(long = "oauth-required-scopes", env = "NEONVIDEO_OAUTH_REQUIRED_SCOPES")]
    pub required_scopes: Option<String>,

    /// Additional scopes advertised in metadata but not enforced
    #[arg(long = "oauth-optional-scopes", env = "NEONVIDEO_OAUTH_OPTIONAL_SCOPES")]
    pub optional_scopes: Option<String>,

    #[arg(
        long = "oauth-authorization-endpoint",
        env = "NEONVIDEO_OAUTH_AUTHORIZATION_ENDPOINT"
    )]
    pub authorization_endpoint: Option<String>,

    #[arg(long = "oauth-token-endpoint", env = "NEONVIDEO_OAUTH_TOKEN_ENDPOINT")]
    pub token_endpoint: Option<String>,

    #[arg(
        long = "oauth-registration-endpoint",
        env = "NEONVIDEO_OAUTH_REGISTRATION_ENDPOINT"
    )]
    pub registration_endpoint: Option<String>,

    #[arg(
        long = "oauth-resource-documentation",
        env = "NEONVIDEO_OAUTH_RESOURCE_DOCUMENTATION"
    )]
    pub resource_documentation: Option<String>,

    /// Expected `aud` claim (defaults to the resource indicator)
    #[arg(long = "oauth-audience", env = "NEONVIDEO_OAUTH_AUDIENCE")]
    pub audience: Option<String>,
}

/// Validated resource-server configuration.
///
/// Built once at startup and shared for the life of the process. URL-valued
/// fields keep the caller's (trimmed) spelling, because the issuer is compared
/// against the `iss` claim as an exact string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceServerConfig {
    issuer: String,
    jwks_uri: Url,
    resource_indicator: String,
    resource_url: Url,
    required_scopes: Vec<String>,
    optional_scopes: Vec<String>,
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    registration_endpoint: Option<String>,
    resource_documentation: Option<String>,
    audience: Option<String>,
}

impl ResourceServerConfig {
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    pub fn resource_indicator(&self) -> &str {
        &self.resource_indicator
    }

    /// The resource indicator as a parsed URL.
    pub fn resource_url(&self) -> &Url {
        &self.resource_url
    }

    pub fn required_scopes(&self) -> &[String] {
        &self.required_scopes
    }

    pub fn optional_scopes(&self) -> &[String] {
        &self.optional_scopes
    }

    pub fn authorization_endpoint(&self) -> Option<&str> {
        self.authorization_endpoint.as_deref()
    }

    pub fn token_endpoint(&self) -> Option<&str> {
        self.token_endpoint.as_deref()
    }

    pub fn registration_endpoint(&self) -> Option<&str> {
        self.registration_endpoint.as_deref()
    }

    pub fn resource_documentation(&self) -> Option<&str> {
        self.resource_documentation.as_deref()
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    /// The `aud` value tokens must carry: the audience override if set,
    /// otherwise the resource indicator.
    pub fn expected_audience(&self) -> &str {
        self.audience
            .as_deref()
            .unwrap_or(&self.resource_indicator)
    }

    /// Absolute URL of the protected-resource metadata document. Rooted at
    /// the resource indicator's origin, where the metadata route is served,
    /// whatever path the indicator carries.
    pub fn metadata_url(&self) -> Url {
        let mut url = self.resource_url.clone();
        url.set_path(PROTECTED_RESOURCE_PATH);
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

/// Resolve settings into a configuration.
///
/// Returns `Ok(None)` when the issuer or the resource indicator is absent,
/// and `Err(OAuthError::Configuration)` naming the field when any URL-valued
/// setting is malformed.
pub fn resolve(settings: &OAuthSettings) -> Result<Option<ResourceServerConfig>, OAuthError> {
    let (Some(issuer), Some(resource)) = (
        non_blank(settings.issuer_url.as_deref()),
        non_blank(settings.resource.as_deref()),
    ) else {
        return Ok(None);
    };

    let issuer_url = ensure_url(issuer, ISSUER_FIELD)?;
    let jwks_uri = match non_blank(settings.jwks_url.as_deref()) {
        Some(jwks) => ensure_url(jwks, JWKS_FIELD)?,
        None => join_path(&issuer_url, JWKS_PATH),
    };
    let resource_url = ensure_url(resource, RESOURCE_FIELD)?;

    Ok(Some(ResourceServerConfig {
        issuer: issuer.to_string(),
        jwks_uri,
        resource_indicator: resource.to_string(),
        resource_url,
        required_scopes: parse_scopes(settings.required_scopes.as_deref()),
        optional_scopes: parse_scopes(settings.optional_scopes.as_deref()),
        authorization_endpoint: optional_url(
            settings.authorization_endpoint.as_deref(),
            AUTHORIZATION_ENDPOINT_FIELD,
        )?,
        token_endpoint: optional_url(settings.token_endpoint.as_deref(), TOKEN_ENDPOINT_FIELD)?,
        registration_endpoint: optional_url(
            settings.registration_endpoint.as_deref(),
            REGISTRATION_ENDPOINT_FIELD,
        )?,
        resource_documentation: optional_url(
            settings.resource_documentation.as_deref(),
            RESOURCE_DOCUMENTATION_FIELD,
        )?,
        audience: non_blank(settings.audience.as_deref()).map(str::to_string),
    }))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_scopes(value: Option<&str>) -> Vec<String> {
    unique_scopes(value.into_iter().flat_map(split_scopes))
}

/// Parse an already-trimmed value as an absolute URL with a host.
fn ensure_url(value: &str, field: &str) -> Result<Url, OAuthError> {
    let url = Url::parse(value).map_err(|e| OAuthError::invalid_url(field, value, e.to_string()))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(OAuthError::invalid_url(
            field,
            value,
            "URL must include protocol and hostname",
        )),
    }
}

fn optional_url(value: Option<&str>, field: &str) -> Result<Option<String>, OAuthError> {
    non_blank(value)
        .map(|v| ensure_url(v, field).map(|_| v.to_string()))
        .transpose()
}

/// Append `suffix` to the path of `base`, treating a trailing slash on the
/// base path as absent. Query and fragment are dropped.
pub(crate) fn join_path(base: &Url, suffix: &str) -> Url {
    let mut joined = base.clone();
    let path = format!("{}{}", base.path().trim_end_matches('/'), suffix);
    joined.set_path(&path);
    joined.set_query(None);
    joined.set_fragment(None);
    joined
}
