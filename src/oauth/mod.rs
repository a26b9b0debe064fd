//! OAuth 2.0 resource server for the NeonVideo MCP endpoint.
//!
//! The server never issues tokens. It validates tokens minted by an external
//! authorization server and publishes Protected Resource Metadata so that
//! clients can find that server.
//!
//! # Architecture
//!
//! - **Configuration** ([`resolve`]): turns [`OAuthSettings`] into a
//!   [`ResourceServerConfig`], or `None` when authorization is not
//!   configured.
//!
//! - **Key sets** ([`KeySetCache`]): one lazily-fetched [`RemoteKeySet`] per
//!   JWKS URI for the life of the process.
//!
//! - **Token verification** ([`TokenVerifier`]): [`JwksVerifier`] checks the
//!   signature, issuer, audience and expiry, extracts scopes from any of the
//!   usual claims, enforces required scopes, and yields an [`AuthInfo`].
//!
//! - **Challenges** ([`bearer_challenge`]) and **metadata**
//!   ([`ProtectedResourceMetadata`]): RFC 6750 and RFC 9728 documents derived
//!   from the configuration.
//!
//! - **HTTP middleware** ([`OAuthLayer`]/[`OAuthService`]): rejects requests
//!   without a valid bearer token with a 401 and attaches [`AuthInfo`] to the
//!   ones that pass.
//!
//! # Discovery flow
//!
//! 1. Client calls `/mcp` without a token
//! 2. Server answers `401` with `WWW-Authenticate: Bearer authorization_uri="..."`
//! 3. Client fetches `/.well-known/oauth-protected-resource` to find the issuer
//! 4. Client obtains a token from the issuer
//! 5. Client retries with `Authorization: Bearer <token>`

pub mod challenge;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod jwks;
pub mod metadata;
pub mod middleware;
pub mod scope;
pub mod token;

pub use challenge::{ChallengeCode, bearer_challenge};
pub use config::{OAuthSettings, PROTECTED_RESOURCE_PATH, ResourceServerConfig, resolve};
pub use error::OAuthError;
pub use jwks::{KeySetCache, KeySetError, RemoteKeySet};
pub use metadata::ProtectedResourceMetadata;
pub use middleware::{OAuthLayer, OAuthService, unauthorized};
pub use scope::{ScopeRequirement, extract_scopes};
pub use token::{AuthInfo, JwksVerifier, TokenVerifier, UNKNOWN_CLIENT};
