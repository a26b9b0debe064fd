//! # neonvideo-mcp
//!
//! A Model Context Protocol server that lets AI assistants create
//! NeonVideo.AI music videos and check on their progress, guarded by an
//! OAuth 2.0 resource-server front door.
//!
//! The server exposes a single tool, `neonvideo_action`, over stateless
//! streamable HTTP. Every piece is a Tower `Service`, so the layers compose
//! the same way axum handlers do:
//!
//! ```text
//! axum Router
//!   POST /mcp ── OAuthLayer ── handle_post ── JsonRpcService ── McpRouter ── action::dispatch
//!   GET  /.well-known/oauth-protected-resource
//! ```
//!
//! - [`oauth`] validates bearer tokens against a remote key set and publishes
//!   Protected Resource Metadata (RFC 9728).
//! - [`jsonrpc`] frames single messages and batches.
//! - [`router`] answers `initialize`, `ping`, `tools/list` and `tools/call`.
//! - [`action`] holds the tool itself: the help, generate-video and
//!   check-status actions and the NeonVideo API client.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neonvideo_mcp::{AppContext, BoxError, HttpTransport, Settings, VideoApiClient, oauth};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let settings = Settings::parse();
//!     let config = oauth::resolve(&settings.oauth)?;
//!     let backend = VideoApiClient::new(settings.api_base_url.clone(), settings.api_timeout())?;
//!     let ctx = AppContext::new(config, backend, settings.fallback_credentials());
//!
//!     let listener = tokio::net::TcpListener::bind(settings.bind_addr()).await?;
//!     HttpTransport::new(Arc::new(ctx))
//!         .serve(listener, async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod config;
pub mod context;
pub mod error;
pub mod jsonrpc;
pub mod oauth;
pub mod protocol;
pub mod router;
pub mod secret;
pub mod transport;

// Re-exports
pub use action::{ActionRequest, VideoApiClient};
pub use config::Settings;
pub use context::AppContext;
pub use error::{BoxError, Error, Result};
pub use jsonrpc::{JsonRpcLayer, JsonRpcService};
pub use oauth::{AuthInfo, JwksVerifier, OAuthLayer, ResourceServerConfig};
pub use protocol::{CallToolResult, Content, JsonRpcRequest, JsonRpcResponse, McpRequest, McpResponse};
pub use router::{McpRouter, RouterRequest, RouterResponse};
pub use secret::SecretString;
pub use transport::HttpTransport;
