//! End-to-end tests for the HTTP transport against a mock NeonVideo API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use neonvideo_mcp::action::backend::Credentials;
use neonvideo_mcp::oauth::{AuthInfo, OAuthSettings, ResourceServerConfig, resolve};
use neonvideo_mcp::protocol::{CallToolParams, McpRequest, RequestId};
use neonvideo_mcp::{
    AppContext, HttpTransport, McpRouter, RouterRequest, SecretString, VideoApiClient,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower::ServiceExt;

const PROMPT: &str = "Create a music video of a 3D animated cowboy mouse living on a farm";
const PROMPT_NO_ID: &str = "A slow ballad about a lighthouse keeper who never sees ships";
const PROMPT_HTML: &str = "An upbeat synthwave track following a courier through neon streets";

#[derive(Default)]
struct Backend {
    calls: AtomicUsize,
    authorization: Mutex<Option<String>>,
    cookie: Mutex<Option<String>>,
}

async fn record(backend: &Backend, headers: &HeaderMap) {
    backend.calls.fetch_add(1, Ordering::SeqCst);
    *backend.authorization.lock().await = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *backend.cookie.lock().await = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
}

async fn create(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> Response {
    record(&backend, &headers).await;
    match body["prompt"].as_str() {
        Some(PROMPT_NO_ID) => axum::Json(json!({"success": true})).into_response(),
        Some(PROMPT_HTML) => "<html>maintenance</html>".into_response(),
        Some(_) => {
            axum::Json(json!({"projectId": "p-123", "message": "Queued for rendering"}))
                .into_response()
        }
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn status(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    record(&backend, &headers).await;
    match id.as_str() {
        "done" => axum::Json(json!({
            "status": "processing",
            "state": "finished",
            "videoUrl": "https://cdn.neonvideo.ai/done.mp4",
            "title": "Cowboy mouse"
        }))
        .into_response(),
        "failed" => axum::Json(json!({"status": "failed", "error": "Out of credits"})).into_response(),
        "denied" => (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"error": "Token expired"})),
        )
            .into_response(),
        "forbidden" => (StatusCode::FORBIDDEN, "nope").into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            axum::Json(json!({"status": "queued"})).into_response()
        }
        _ => axum::Json(json!({"status": "rendering"})).into_response(),
    }
}

async fn start_backend() -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/neon-single-prompt", post(create))
        .route("/api/neon-single-prompt/status/{id}", get(status))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{}", addr.port()), backend)
}

fn oauth_config() -> ResourceServerConfig {
    resolve(&OAuthSettings {
        issuer_url: Some("https://auth.example.com".to_string()),
        resource: Some("https://mcp.example.com".to_string()),
        required_scopes: Some("video:write".to_string()),
        ..Default::default()
    })
    .unwrap()
    .unwrap()
}

fn context(base: &str, oauth: bool, fallback: Credentials) -> Arc<AppContext> {
    let backend = VideoApiClient::new(base.parse().unwrap(), Duration::from_millis(500)).unwrap();
    Arc::new(AppContext::new(oauth.then(oauth_config), backend, fallback))
}

fn env_token(token: &str) -> Credentials {
    Credentials {
        token: Some(SecretString::new(token)),
        cookie: None,
    }
}

fn tool_call(arguments: Value) -> Request<Body> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": {"name": "neonvideo_action", "arguments": arguments}
    });
    Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Call the tool over HTTP and return the `result` object.
async fn call_tool(ctx: Arc<AppContext>, arguments: Value) -> Value {
    let response = HttpTransport::new(ctx)
        .into_router()
        .oneshot(tool_call(arguments))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["id"], 7);
    value["result"].clone()
}

/// Call the tool through the router with a verified identity attached.
async fn call_as(ctx: Arc<AppContext>, token: &str, arguments: Value) -> Value {
    let auth = AuthInfo {
        token: SecretString::new(token),
        client_id: "chatgpt".to_string(),
        scopes: vec!["video:write".to_string()],
        expires_at: None,
        resource: "https://mcp.example.com".parse().unwrap(),
        extra: Default::default(),
    };
    let request = RouterRequest {
        id: RequestId::Number(1),
        inner: McpRequest::CallTool(CallToolParams {
            name: "neonvideo_action".to_string(),
            arguments,
            meta: None,
        }),
        auth: Some(auth),
    };
    let response = McpRouter::new(ctx).oneshot(request).await.unwrap();
    serde_json::to_value(response.inner.unwrap()).unwrap()
}

#[tokio::test]
async fn test_unauthenticated_generate_never_reaches_backend() {
    let (base, backend) = start_backend().await;
    let app = HttpTransport::new(context(&base, true, env_token("env-token"))).into_router();

    let response = app
        .oneshot(tool_call(json!({"action": "generate_video", "prompt": PROMPT})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response.headers()[header::WWW_AUTHENTICATE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(challenge.contains("error=\"invalid_request\""));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_generate_video_with_env_token() {
    let (base, backend) = start_backend().await;
    let ctx = context(&base, false, env_token("env-token"));

    let result = call_tool(ctx, json!({"action": "generate_video", "prompt": PROMPT})).await;

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        backend.authorization.lock().await.as_deref(),
        Some("Bearer env-token")
    );
    let view = &result["structuredContent"];
    assert_eq!(view["view"], "status");
    assert_eq!(view["projectId"], "p-123");
    assert_eq!(view["status"], "queued");
    assert_eq!(view["message"], "Queued for rendering");
    assert_eq!(
        view["pollUrl"],
        format!("{}/api/neon-single-prompt/status/p-123", base)
    );
    assert!(
        result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("project p-123")
    );
}

#[tokio::test]
async fn test_generate_without_project_id_is_api_error() {
    let (base, backend) = start_backend().await;
    let ctx = context(&base, false, env_token("env-token"));

    let result = call_tool(ctx, json!({"action": "generate_video", "prompt": PROMPT_NO_ID})).await;

    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        result["content"][0]["text"],
        "NeonVideo.AI did not provide a project identifier."
    );
    let view = &result["structuredContent"];
    assert_eq!(view["view"], "error");
    assert_eq!(view["error"]["type"], "api");
    assert_eq!(
        view["error"]["message"],
        "NeonVideo API response was missing expected fields."
    );
    assert_eq!(view["error"]["details"], r#"{"success":true}"#);
    assert!(result.get("isError").is_none());
}

#[tokio::test]
async fn test_generate_with_non_json_success_body_is_api_error() {
    let (base, _) = start_backend().await;
    let ctx = context(&base, false, env_token("env-token"));

    let result = call_tool(ctx, json!({"action": "generate_video", "prompt": PROMPT_HTML})).await;

    let error = &result["structuredContent"]["error"];
    assert_eq!(error["type"], "api");
    assert_eq!(error["status"], 200);
    assert_eq!(error["message"], "NeonVideo API returned 200 OK");
    assert_eq!(error["details"], "<html>maintenance</html>");
    assert!(result.get("_meta").is_none());
}

#[tokio::test]
async fn test_per_call_token_wins_and_cookie_is_prefixed() {
    let (base, backend) = start_backend().await;
    let ctx = context(
        &base,
        false,
        Credentials {
            token: Some(SecretString::new("env-token")),
            cookie: Some(SecretString::new("cookie-value")),
        },
    );

    call_tool(
        ctx,
        json!({"action": "check_status", "projectId": "p-1", "authToken": " Bearer call-token "}),
    )
    .await;

    assert_eq!(
        backend.authorization.lock().await.as_deref(),
        Some("Bearer call-token")
    );
    assert_eq!(
        backend.cookie.lock().await.as_deref(),
        Some("auth_token=cookie-value")
    );
}

#[tokio::test]
async fn test_session_token_is_forwarded() {
    let (base, backend) = start_backend().await;
    let ctx = context(&base, true, Credentials::default());

    let result = call_as(ctx, "session-token", json!({"action": "check_status", "projectId": "p-9"})).await;

    assert_eq!(
        backend.authorization.lock().await.as_deref(),
        Some("Bearer session-token")
    );
    assert_eq!(result["structuredContent"]["status"], "generating");
}

#[tokio::test]
async fn test_status_is_normalized() {
    let (base, _) = start_backend().await;
    let ctx = context(&base, false, env_token("env-token"));

    let result = call_tool(ctx, json!({"action": "check_status", "projectId": "done"})).await;

    let view = &result["structuredContent"];
    assert_eq!(view["status"], "complete");
    assert_eq!(view["finalVideoUrl"], "https://cdn.neonvideo.ai/done.mp4");
    assert_eq!(view["prompt"], "Cowboy mouse");
    assert_eq!(
        result["content"][0]["text"],
        "Project done is complete. Enjoy your NeonVideo!"
    );
}

#[tokio::test]
async fn test_generation_error_is_reported_in_status_view() {
    let (base, _) = start_backend().await;
    let ctx = context(&base, false, env_token("env-token"));

    let result = call_tool(ctx, json!({"action": "check_status", "projectId": "failed"})).await;

    let view = &result["structuredContent"];
    assert_eq!(view["view"], "status");
    assert_eq!(view["status"], "error");
    assert_eq!(view["error"]["type"], "api");
    assert_eq!(view["error"]["message"], "Out of credits");
}

#[tokio::test]
async fn test_backend_401_carries_challenge() {
    let (base, _) = start_backend().await;
    let ctx = context(&base, true, Credentials::default());

    let result = call_as(ctx, "stale-token", json!({"action": "check_status", "projectId": "denied"})).await;

    let view = &result["structuredContent"];
    assert_eq!(view["view"], "error");
    assert_eq!(view["error"]["type"], "auth");
    assert_eq!(view["error"]["status"], 401);
    assert_eq!(view["error"]["message"], "Token expired");
    let challenge = result["_meta"]["mcp/www_authenticate"].as_str().unwrap();
    assert!(challenge.contains("error=\"invalid_token\""));
    assert!(challenge.contains("Access token was rejected by NeonVideo.AI."));
    assert!(result.get("isError").is_none());
}

#[tokio::test]
async fn test_backend_403_asks_for_scopes() {
    let (base, _) = start_backend().await;
    let ctx = context(&base, true, Credentials::default());

    let result = call_as(ctx, "narrow-token", json!({"action": "check_status", "projectId": "forbidden"})).await;

    let view = &result["structuredContent"];
    assert_eq!(view["error"]["type"], "auth");
    assert_eq!(view["error"]["status"], 403);
    assert_eq!(view["error"]["details"], "nope");
    let challenge = result["_meta"]["mcp/www_authenticate"].as_str().unwrap();
    assert!(challenge.contains("error=\"insufficient_scope\""));
}

#[tokio::test]
async fn test_backend_401_without_oauth_has_no_challenge() {
    let (base, _) = start_backend().await;
    let ctx = context(&base, false, env_token("env-token"));

    let result = call_tool(ctx, json!({"action": "check_status", "projectId": "denied"})).await;

    assert_eq!(result["structuredContent"]["error"]["type"], "auth");
    assert!(result.get("_meta").is_none());
}

#[tokio::test]
async fn test_backend_500_is_api_error() {
    let (base, _) = start_backend().await;
    let ctx = context(&base, false, env_token("env-token"));

    let result = call_tool(ctx, json!({"action": "check_status", "projectId": "broken"})).await;

    let error = &result["structuredContent"]["error"];
    assert_eq!(error["type"], "api");
    assert_eq!(error["status"], 500);
    assert_eq!(error["message"], "Failed to fetch project broken (500)");
    assert_eq!(error["details"], "<html>oops</html>");
}

#[tokio::test]
async fn test_backend_timeout_is_network_error() {
    let (base, _) = start_backend().await;
    let ctx = context(&base, false, env_token("env-token"));

    let result = call_tool(ctx, json!({"action": "check_status", "projectId": "slow"})).await;

    let error = &result["structuredContent"]["error"];
    assert_eq!(error["type"], "network");
    assert_eq!(error["message"], "Request timed out after 500 ms");
}

#[tokio::test]
async fn test_short_prompt_is_not_sent() {
    let (base, backend) = start_backend().await;
    let ctx = context(&base, false, env_token("env-token"));

    let result = call_tool(ctx, json!({"action": "generate_video", "prompt": "a cat"})).await;

    assert_eq!(result["structuredContent"]["error"]["type"], "validation");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_over_http() {
    let (base, _) = start_backend().await;
    let app = HttpTransport::new(context(&base, false, Credentials::default())).into_router();

    let body = json!([
        {"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05"}},
        {"jsonrpc": "2.0", "method": "notifications/initialized"},
        {"jsonrpc": "2.0", "id": 2, "method": "tools/list"}
    ]);
    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .body(Body::from(body.to_string()))
        .unwrap();
    let value = json_body(app.oneshot(request).await.unwrap()).await;

    let responses = value.as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(responses[1]["result"]["tools"][0]["name"], "neonvideo_action");
}
