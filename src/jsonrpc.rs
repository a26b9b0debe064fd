//! JSON-RPC 2.0 service layer
//!
//! [`JsonRpcService`] turns one parsed HTTP body into JSON-RPC responses:
//!
//! - Single messages and batches (processed in order)
//! - Notifications and client responses, which produce no reply
//! - JSON-RPC version validation
//! - Error conversion to JSON-RPC error responses
//!
//! When a body holds nothing that needs a reply the service yields `None`
//! and the transport answers `202 Accepted`.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tower::Layer;
use tower_service::Service;

use crate::error::JsonRpcError;
use crate::oauth::AuthInfo;
use crate::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpRequest, RequestId,
};
use crate::router::{RouterRequest, RouterResponse};

/// Tower layer that adds JSON-RPC 2.0 framing to an MCP service.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcLayer {
    _priv: (),
}

impl JsonRpcLayer {
    pub fn new() -> Self {
        Self { _priv: () }
    }
}

impl<S> Layer<S> for JsonRpcLayer {
    type Service = JsonRpcService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        JsonRpcService::new(inner)
    }
}

/// One HTTP body's worth of JSON-RPC, plus the identity it arrived with.
#[derive(Debug, Clone)]
pub struct JsonRpcCall {
    pub body: Value,
    pub auth: Option<AuthInfo>,
}

/// Replies to a [`JsonRpcCall`].
#[derive(Debug, Clone)]
pub enum JsonRpcReply {
    /// Nothing to answer (notifications or responses only)
    Accepted,
    Single(JsonRpcResponse),
    Batch(Vec<JsonRpcResponse>),
}

impl JsonRpcReply {
    /// The reply body, or `None` for [`JsonRpcReply::Accepted`].
    pub fn into_value(self) -> Option<Value> {
        match self {
            JsonRpcReply::Accepted => None,
            JsonRpcReply::Single(response) => serde_json::to_value(response).ok(),
            JsonRpcReply::Batch(responses) => serde_json::to_value(responses).ok(),
        }
    }
}

/// Service that handles JSON-RPC framing around an MCP router.
#[derive(Debug, Clone)]
pub struct JsonRpcService<S> {
    inner: S,
}

impl<S> JsonRpcService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> Service<JsonRpcCall> for JsonRpcService<S>
where
    S: Service<RouterRequest, Response = RouterResponse, Error = Infallible>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = JsonRpcReply;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: JsonRpcCall) -> Self::Future {
        let inner = self.inner.clone();
        Box::pin(async move {
            let JsonRpcCall { body, auth } = call;
            let reply = match body {
                Value::Array(messages) => {
                    if messages.is_empty() {
                        return Ok(JsonRpcReply::Single(JsonRpcResponse::error(
                            None,
                            JsonRpcError::invalid_request("Empty batch request"),
                        )));
                    }

                    let mut responses = Vec::with_capacity(messages.len());
                    for message in messages {
                        if let Some(response) =
                            process_message(inner.clone(), message, auth.clone()).await
                        {
                            responses.push(response);
                        }
                    }

                    if responses.is_empty() {
                        JsonRpcReply::Accepted
                    } else {
                        JsonRpcReply::Batch(responses)
                    }
                }
                message => match process_message(inner, message, auth).await {
                    Some(response) => JsonRpcReply::Single(response),
                    None => JsonRpcReply::Accepted,
                },
            };
            Ok(reply)
        })
    }
}

/// Handle one message. Returns `None` for messages that get no reply.
async fn process_message<S>(
    inner: S,
    message: Value,
    auth: Option<AuthInfo>,
) -> Option<JsonRpcResponse>
where
    S: Service<RouterRequest, Response = RouterResponse, Error = Infallible> + Send + 'static,
    S::Future: Send,
{
    let Value::Object(fields) = &message else {
        return Some(JsonRpcResponse::error(
            None,
            JsonRpcError::invalid_request("Invalid Request: expected a JSON object"),
        ));
    };

    let has_method = fields.contains_key("method");
    let id = fields
        .get("id")
        .filter(|id| !id.is_null())
        .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

    match (has_method, id) {
        (true, Some(id)) => match serde_json::from_value::<JsonRpcRequest>(message) {
            Ok(req) => Some(process_single_request(inner, req, auth).await),
            Err(e) => Some(JsonRpcResponse::error(
                Some(id),
                JsonRpcError::invalid_request(format!("Invalid Request: {}", e)),
            )),
        },
        (true, None) => {
            match serde_json::from_value::<JsonRpcNotification>(message) {
                Ok(notification) => {
                    tracing::debug!(method = %notification.method, "Received notification");
                }
                Err(e) => tracing::debug!(error = %e, "Ignoring malformed notification"),
            }
            None
        }
        // A response to a server-initiated request; this server never sends any.
        (false, _) => {
            tracing::debug!("Ignoring JSON-RPC response from client");
            None
        }
    }
}

/// Helper function to process a single JSON-RPC request
async fn process_single_request<S>(
    mut inner: S,
    req: JsonRpcRequest,
    auth: Option<AuthInfo>,
) -> JsonRpcResponse
where
    S: Service<RouterRequest, Response = RouterResponse, Error = Infallible> + Send + 'static,
    S::Future: Send,
{
    if let Err(e) = req.validate() {
        return JsonRpcResponse::error(Some(req.id), e);
    }

    let mcp_request = match McpRequest::from_jsonrpc(&req) {
        Ok(r) => r,
        Err(e) => {
            return JsonRpcResponse::error(
                Some(req.id),
                JsonRpcError::invalid_params(e.to_string()),
            );
        }
    };

    let router_req = RouterRequest {
        id: req.id,
        inner: mcp_request,
        auth,
    };

    match inner.call(router_req).await {
        Ok(response) => response.into_jsonrpc(),
        Err(never) => match never {},
    }
}
