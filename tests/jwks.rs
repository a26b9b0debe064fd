//! Integration tests for JWKS-based access token verification.
//!
//! These tests spin up a lightweight axum server serving a JWKS endpoint,
//! then use `JwksVerifier` to check tokens signed with the matching private
//! key.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::routing::get;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use neonvideo_mcp::oauth::{
    JwksVerifier, OAuthError, OAuthSettings, ResourceServerConfig, TokenVerifier, resolve,
};
use neonvideo_mcp::{AppContext, HttpTransport, VideoApiClient};
use serde_json::json;
use tower::ServiceExt;

const ISSUER: &str = "https://auth.example.com";
const RESOURCE: &str = "https://mcp.example.com";
const KID: &str = "test-key-1";

/// RSA key pair generated for testing (2048-bit). Not used anywhere else.
fn test_rsa_keypair() -> (EncodingKey, serde_json::Value) {
    let rsa_private_pem = include_str!("fixtures/rsa_private.pem");
    let rsa_public_jwk = include_str!("fixtures/rsa_public.jwk.json");

    let encoding_key = EncodingKey::from_rsa_pem(rsa_private_pem.as_bytes()).unwrap();
    let public_jwk: serde_json::Value = serde_json::from_str(rsa_public_jwk).unwrap();

    (encoding_key, public_jwk)
}

/// Spin up a mock JWKS server. Returns its base URL and a fetch counter.
async fn start_jwks_server(jwks: serde_json::Value) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/.well-known/jwks.json",
        get(move || {
            let jwks = jwks.clone();
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                axum::Json(jwks)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{}", addr.port()), hits)
}

fn config(jwks_base: &str, required: Option<&str>, audience: Option<&str>) -> ResourceServerConfig {
    resolve(&OAuthSettings {
        issuer_url: Some(ISSUER.to_string()),
        resource: Some(RESOURCE.to_string()),
        jwks_url: Some(format!("{}/.well-known/jwks.json", jwks_base)),
        required_scopes: required.map(str::to_string),
        audience: audience.map(str::to_string),
        ..Default::default()
    })
    .unwrap()
    .unwrap()
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn sign(key: &EncodingKey, claims: serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    jsonwebtoken::encode(&header, &claims, key).unwrap()
}

fn claims(extra: serde_json::Value) -> serde_json::Value {
    let mut claims = json!({
        "iss": ISSUER,
        "aud": RESOURCE,
        "sub": "user-42",
        "azp": "chatgpt",
        "exp": now() + 3600,
        "iat": now(),
    });
    if let (Some(claims), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            claims.insert(k.clone(), v.clone());
        }
    }
    claims
}

async fn setup(
    required: Option<&str>,
) -> (EncodingKey, ResourceServerConfig, Arc<AtomicUsize>) {
    let (key, jwk) = test_rsa_keypair();
    let (base, hits) = start_jwks_server(json!({ "keys": [jwk] })).await;
    (key, config(&base, required, None), hits)
}

#[tokio::test]
async fn test_valid_token() {
    let (key, config, _) = setup(Some("video:read")).await;
    let token = sign(&key, claims(json!({"scope": "video:read video:write"})));

    let info = JwksVerifier::default().verify(&token, &config).await.unwrap();
    assert_eq!(info.client_id, "chatgpt");
    assert_eq!(info.scopes, vec!["video:read", "video:write"]);
    assert_eq!(info.subject(), Some("user-42"));
    assert_eq!(info.resource.as_str(), "https://mcp.example.com/");
    assert!(info.expires_at.is_some());
    assert_eq!(info.token.expose(), token);
}

#[tokio::test]
async fn test_wrong_issuer() {
    let (key, config, _) = setup(None).await;
    let token = sign(&key, claims(json!({"iss": "https://evil.example.com"})));

    let err = JwksVerifier::default().verify(&token, &config).await.unwrap_err();
    assert!(matches!(err, OAuthError::InvalidToken { .. }));
}

#[tokio::test]
async fn test_issuer_trailing_slash_is_not_normalized() {
    let (key, config, _) = setup(None).await;
    let token = sign(&key, claims(json!({"iss": format!("{}/", ISSUER)})));

    let err = JwksVerifier::default().verify(&token, &config).await.unwrap_err();
    assert!(matches!(err, OAuthError::InvalidToken { .. }));
}

#[tokio::test]
async fn test_wrong_audience() {
    let (key, config, _) = setup(None).await;
    let token = sign(&key, claims(json!({"aud": "https://other.example.com"})));

    let err = JwksVerifier::default().verify(&token, &config).await.unwrap_err();
    assert_eq!(
        err,
        OAuthError::invalid_token("token audience does not match")
    );
}

#[tokio::test]
async fn test_audience_override() {
    let (key, jwk) = test_rsa_keypair();
    let (base, _) = start_jwks_server(json!({ "keys": [jwk] })).await;
    let config = config(&base, None, Some("neonvideo-api"));

    let token = sign(&key, claims(json!({"aud": ["neonvideo-api", "other"]})));
    assert!(JwksVerifier::default().verify(&token, &config).await.is_ok());

    let token = sign(&key, claims(json!({})));
    assert!(JwksVerifier::default().verify(&token, &config).await.is_err());
}

#[tokio::test]
async fn test_expired_token() {
    let (key, config, _) = setup(None).await;
    let token = sign(&key, claims(json!({"exp": now() - 60})));

    let err = JwksVerifier::default().verify(&token, &config).await.unwrap_err();
    assert_eq!(err, OAuthError::invalid_token("token has expired"));
}

#[tokio::test]
async fn test_missing_required_scope() {
    let (key, config, _) = setup(Some("video:read video:write")).await;
    let token = sign(&key, claims(json!({"scope": "video:read"})));

    let err = JwksVerifier::default().verify(&token, &config).await.unwrap_err();
    assert_eq!(
        err,
        OAuthError::InsufficientScope {
            missing: vec!["video:write".to_string()]
        }
    );
}

#[tokio::test]
async fn test_scopes_merge_across_claims() {
    let (key, config, _) = setup(Some("video:read,admin")).await;
    let token = sign(
        &key,
        claims(json!({
            "scope": "video:read",
            "roles": ["admin", "video:read"],
            "permissions": "video:write"
        })),
    );

    let info = JwksVerifier::default().verify(&token, &config).await.unwrap();
    assert_eq!(info.scopes, vec!["video:read", "video:write", "admin"]);
}

#[tokio::test]
async fn test_tampered_signature() {
    let (key, config, _) = setup(None).await;
    let token = sign(&key, claims(json!({})));
    let forged = sign(&key, claims(json!({"sub": "someone-else"})));
    let parts: Vec<&str> = token.split('.').collect();
    let forged_payload = forged.split('.').nth(1).unwrap();
    let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

    let err = JwksVerifier::default()
        .verify(&tampered, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthError::InvalidToken { .. }));
}

#[tokio::test]
async fn test_symmetric_algorithm_is_rejected() {
    let (_, config, hits) = setup(None).await;
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims(json!({})),
        &EncodingKey::from_secret(b"shared"),
    )
    .unwrap();

    let err = JwksVerifier::default().verify(&token, &config).await.unwrap_err();
    assert!(matches!(err, OAuthError::InvalidToken { .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_key_set_is_fetched_once() {
    let (key, config, hits) = setup(None).await;
    let verifier = JwksVerifier::default();

    for _ in 0..3 {
        let token = sign(&key, claims(json!({})));
        verifier.verify(&token, &config).await.unwrap();
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(verifier.key_sets().len(), 1);
}

#[tokio::test]
async fn test_unreachable_key_set() {
    let (key, _) = test_rsa_keypair();
    let config = config("http://127.0.0.1:9", None, None);
    let token = sign(&key, claims(json!({})));

    let err = JwksVerifier::default().verify(&token, &config).await.unwrap_err();
    assert!(matches!(err, OAuthError::InvalidToken { .. }));
}

#[tokio::test]
async fn test_http_endpoint_with_verified_token() {
    let (key, config, _) = setup(Some("video:read")).await;
    let backend =
        VideoApiClient::new("http://127.0.0.1:9".parse().unwrap(), std::time::Duration::from_secs(1))
            .unwrap();
    let app = HttpTransport::new(Arc::new(AppContext::new(
        Some(config),
        backend,
        Default::default(),
    )))
    .into_router();

    let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string();
    let request = |token: String| {
        Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.clone()))
            .unwrap()
    };

    let good = sign(&key, claims(json!({"scope": "video:read"})));
    let response = app.clone().oneshot(request(good)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["result"]["tools"][0]["name"], "neonvideo_action");

    let narrow = sign(&key, claims(json!({"scope": "profile"})));
    let response = app.oneshot(request(narrow)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response.headers()[header::WWW_AUTHENTICATE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(challenge.contains("error=\"insufficient_scope\""));
    assert!(challenge.contains("scope=\"video:read\""));
}
