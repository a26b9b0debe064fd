//! Stateless HTTP transport for MCP
//!
//! Serves two routes:
//!
//! - `POST /mcp`: JSON-RPC messages, answered with plain JSON (no SSE, no
//!   session header). Guarded by [`OAuthLayer`] when authorization is
//!   configured. Other methods on `/mcp` get `405`.
//! - `GET /.well-known/oauth-protected-resource`: the RFC 9728 metadata
//!   document, or `404` when authorization is not configured.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use neonvideo_mcp::action::VideoApiClient;
//! use neonvideo_mcp::context::AppContext;
//! use neonvideo_mcp::transport::HttpTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = VideoApiClient::new("https://neonvideo.ai".parse()?, Duration::from_secs(60))?;
//!     let ctx = AppContext::new(None, backend, Default::default());
//!
//!     let app = HttpTransport::new(Arc::new(ctx)).into_router();
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{Extensions, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower::{Layer, ServiceExt};

use crate::context::AppContext;
use crate::error::{JsonRpcError, Result};
use crate::jsonrpc::{JsonRpcCall, JsonRpcLayer, JsonRpcReply, JsonRpcService};
use crate::oauth::{
    AuthInfo, ChallengeCode, OAuthLayer, PROTECTED_RESOURCE_PATH, ProtectedResourceMetadata,
    unauthorized,
};
use crate::protocol::JsonRpcResponse;
use crate::router::McpRouter;

/// Path of the MCP endpoint.
pub const MCP_PATH: &str = "/mcp";

/// Shared caches may keep the metadata document for five minutes and serve it
/// stale for ten more while revalidating.
pub const METADATA_CACHE_CONTROL: &str = "public, max-age=300, stale-while-revalidate=600";

const METADATA_NOT_CONFIGURED: &str = "OAuth metadata is not configured for this server.";
const VERIFICATION_FAILED: &str = "Access token verification failed.";

struct AppState {
    ctx: Arc<AppContext>,
    rpc: JsonRpcService<McpRouter>,
}

/// HTTP transport for the NeonVideo MCP server
#[derive(Debug, Clone)]
pub struct HttpTransport {
    ctx: Arc<AppContext>,
}

impl HttpTransport {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Build the axum router for this transport
    pub fn into_router(self) -> Router {
        let oauth = OAuthLayer::new(self.ctx.oauth().cloned(), self.ctx.verifier().clone());
        let rpc = JsonRpcLayer::new().layer(McpRouter::new(self.ctx.clone()));
        let state = Arc::new(AppState {
            ctx: self.ctx,
            rpc,
        });

        let mcp = post(handle_post).fallback(method_not_allowed).layer(oauth);

        Router::new()
            .route(MCP_PATH, mcp)
            .route(PROTECTED_RESOURCE_PATH, get(protected_resource_metadata))
            .with_state(state)
    }

    /// Serve the transport on an already-bound listener until `shutdown`
    /// resolves. In-flight requests are allowed to finish.
    pub async fn serve<F>(self, listener: tokio::net::TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.into_router();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

/// Handle POST requests (JSON-RPC messages from client)
async fn handle_post(
    State(state): State<Arc<AppState>>,
    extensions: Extensions,
    body: String,
) -> Response {
    let auth = extensions.get::<AuthInfo>().cloned();

    // The middleware should have rejected this already.
    if let Some(config) = state.ctx.oauth() {
        if auth.is_none() {
            tracing::warn!("request reached the MCP handler without a verified identity");
            return unauthorized(config, ChallengeCode::InvalidToken, VERIFICATION_FAILED);
        }
    }

    let parsed: serde_json::Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            return json_rpc_error_response(JsonRpcError::parse_error(format!(
                "Invalid JSON: {}",
                e
            )));
        }
    };

    let reply = match state
        .rpc
        .clone()
        .oneshot(JsonRpcCall { body: parsed, auth })
        .await
    {
        Ok(reply) => reply,
        Err(never) => match never {},
    };

    match reply {
        JsonRpcReply::Accepted => StatusCode::ACCEPTED.into_response(),
        reply => match reply.into_value() {
            Some(value) => Json(value).into_response(),
            None => json_rpc_error_response(JsonRpcError::internal_error(
                "Failed to serialize response",
            )),
        },
    }
}

/// Anything but POST on the MCP endpoint. There is no SSE stream to GET and
/// no session to DELETE.
async fn method_not_allowed() -> Response {
    let mut response = (
        StatusCode::METHOD_NOT_ALLOWED,
        "Method not allowed: this endpoint only accepts POST",
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("POST"));
    response
}

async fn protected_resource_metadata(State(state): State<Arc<AppState>>) -> Response {
    let Some(config) = state.ctx.oauth() else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": METADATA_NOT_CONFIGURED })),
        )
            .into_response();
    };

    (
        [(header::CACHE_CONTROL, METADATA_CACHE_CONTROL)],
        Json(ProtectedResourceMetadata::from_config(config)),
    )
        .into_response()
}

/// Create a JSON-RPC error response
fn json_rpc_error_response(error: JsonRpcError) -> Response {
    Json(JsonRpcResponse::error(None, error)).into_response()
}
