//! MCP Router - routes requests to the NeonVideo tool
//!
//! The router implements Tower's `Service` trait, making it composable with
//! standard tower middleware. It is stateless: every request carries
//! everything needed to answer it, including the identity the authorization
//! middleware attached.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower_service::Service;

use crate::action::{self, APP_NAME, ActionRequest, TOOL_NAME};
use crate::action::output::{ErrorDetail, ErrorKind, ToolOutcome};
use crate::context::AppContext;
use crate::error::JsonRpcError;
use crate::oauth::AuthInfo;
use crate::protocol::*;

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "neonvideo-ai";

const INSTRUCTIONS: &str = "Use neonvideo_action to create NeonVideo.AI music videos and check on their progress. \
Call it with action \"help\" for the available commands.";

/// MCP Router that dispatches requests to the action dispatcher
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use neonvideo_mcp::action::VideoApiClient;
/// use neonvideo_mcp::context::AppContext;
/// use neonvideo_mcp::router::McpRouter;
///
/// let backend = VideoApiClient::new(
///     "https://neonvideo.ai".parse().unwrap(),
///     Duration::from_secs(60),
/// )
/// .unwrap();
/// let ctx = AppContext::new(None, backend, Default::default());
/// let router = McpRouter::new(Arc::new(ctx));
/// assert_eq!(router.tools()[0].name, "neonvideo_action");
/// ```
#[derive(Debug, Clone)]
pub struct McpRouter {
    ctx: Arc<AppContext>,
}

impl McpRouter {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Tools advertised by `tools/list`.
    pub fn tools(&self) -> Vec<ToolDefinition> {
        let input_schema = serde_json::to_value(schemars::schema_for!(ActionRequest))
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
        let title = format!("{} actions", APP_NAME);

        vec![ToolDefinition {
            name: TOOL_NAME.to_string(),
            title: Some(title.clone()),
            description: Some(
                "Generate NeonVideo music videos or retrieve project status.".to_string(),
            ),
            input_schema,
            annotations: Some(ToolAnnotations {
                title: Some(title),
                read_only_hint: false,
                open_world_hint: true,
            }),
        }]
    }

    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
        }
    }

    async fn handle(
        &self,
        request: McpRequest,
        auth: Option<AuthInfo>,
    ) -> Result<McpResponse, JsonRpcError> {
        match request {
            McpRequest::Initialize(params) => {
                let requested = params.protocol_version.unwrap_or_default();
                tracing::info!(
                    client = params.client_info.as_ref().map(|c| c.name.as_str()),
                    version = params.client_info.as_ref().map(|c| c.version.as_str()),
                    protocol_version = %requested,
                    "Client initializing"
                );

                // Echo the client's version when supported, otherwise offer our latest
                let protocol_version = if SUPPORTED_PROTOCOL_VERSIONS.contains(&requested.as_str())
                {
                    requested
                } else {
                    LATEST_PROTOCOL_VERSION.to_string()
                };

                Ok(McpResponse::Initialize(InitializeResult {
                    protocol_version,
                    capabilities: self.capabilities(),
                    server_info: Implementation {
                        name: SERVER_NAME.to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                    instructions: Some(INSTRUCTIONS.to_string()),
                }))
            }

            McpRequest::ListTools => Ok(McpResponse::ListTools(ListToolsResult {
                tools: self.tools(),
            })),

            McpRequest::CallTool(params) => {
                if params.name != TOOL_NAME {
                    return Err(JsonRpcError::method_not_found(&params.name));
                }

                let arguments = if params.arguments.is_null() {
                    serde_json::json!({})
                } else {
                    params.arguments
                };

                tracing::debug!(tool = %params.name, "Calling tool");
                let outcome = match serde_json::from_value::<ActionRequest>(arguments) {
                    Ok(request) => action::dispatch(&self.ctx, request, auth.as_ref()).await,
                    Err(e) => {
                        tracing::warn!(error = %e, "rejecting malformed tool arguments");
                        ToolOutcome::failure(
                            format!("Invalid arguments for {}: {}", TOOL_NAME, e),
                            ErrorDetail::new(ErrorKind::Validation, "Invalid tool arguments.")
                                .with_details(e.to_string()),
                        )
                    }
                };

                Ok(McpResponse::CallTool(outcome.into_call_tool_result()))
            }

            McpRequest::Ping => Ok(McpResponse::Pong(EmptyResult {})),

            McpRequest::Unknown { method } => Err(JsonRpcError::method_not_found(&method)),
        }
    }
}

/// Request type for the tower Service implementation
#[derive(Debug)]
pub struct RouterRequest {
    pub id: RequestId,
    pub inner: McpRequest,
    /// Identity attached by the authorization middleware, if any.
    pub auth: Option<AuthInfo>,
}

/// Response type for the tower Service implementation
#[derive(Debug)]
pub struct RouterResponse {
    pub id: RequestId,
    pub inner: Result<McpResponse, JsonRpcError>,
}

impl RouterResponse {
    /// Convert to JSON-RPC response
    pub fn into_jsonrpc(self) -> JsonRpcResponse {
        match self.inner {
            Ok(response) => match serde_json::to_value(response) {
                Ok(result) => JsonRpcResponse::result(self.id, result),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize response");
                    JsonRpcResponse::error(
                        Some(self.id),
                        JsonRpcError::internal_error(format!("Serialization error: {}", e)),
                    )
                }
            },
            Err(error) => JsonRpcResponse::error(Some(self.id), error),
        }
    }
}

impl Service<RouterRequest> for McpRouter {
    type Response = RouterResponse;
    type Error = std::convert::Infallible; // Errors are in the response
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RouterRequest) -> Self::Future {
        let router = self.clone();
        Box::pin(async move {
            let method = req.inner.method_name().to_string();
            let inner = router.handle(req.inner, req.auth).await;
            if let Err(error) = &inner {
                tracing::debug!(method = %method, code = error.code, "request failed");
            }
            Ok(RouterResponse { id: req.id, inner })
        })
    }
}
