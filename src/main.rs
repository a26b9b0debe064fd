//! NeonVideo MCP server binary.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use neonvideo_mcp::oauth::{self, PROTECTED_RESOURCE_PATH};
use neonvideo_mcp::transport::MCP_PATH;
use neonvideo_mcp::{AppContext, BoxError, HttpTransport, Settings, VideoApiClient};
use url::Url;

#[tokio::main]
async fn main() -> ExitCode {
    let settings = Settings::parse();

    if let Err(e) = init_tracing(&settings.log_level) {
        eprintln!("invalid log level {:?}: {}", settings.log_level, e);
        return ExitCode::FAILURE;
    }

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str) -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("neonvideo_mcp={}", level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(settings: Settings) -> Result<(), BoxError> {
    let config = oauth::resolve(&settings.oauth)?;

    match &config {
        Some(config) => tracing::info!(
            issuer = config.issuer(),
            resource = config.resource_indicator(),
            audience = config.expected_audience(),
            jwks_uri = %config.jwks_uri(),
            required_scopes = %config.required_scopes().join(" "),
            "OAuth resource server configuration loaded"
        ),
        None => tracing::warn!(
            "OAuth is not configured. Set NEONVIDEO_OAUTH_* environment variables to enable authorization checks."
        ),
    }
    let published_metadata = config.as_ref().map(|c| c.metadata_url());

    let backend = VideoApiClient::new(settings.api_base_url.clone(), settings.api_timeout())?;
    tracing::info!(
        base_url = %backend.base_url(),
        timeout_ms = settings.api_timeout_ms,
        fallback_credentials = !settings.fallback_credentials().is_empty(),
        "NeonVideo API client ready"
    );

    let ctx = AppContext::new(config, backend, settings.fallback_credentials());

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;
    let local = listener.local_addr()?;

    tracing::info!("NeonVideo MCP server listening on http://{}{}", local, MCP_PATH);
    for line in metadata_announcements(published_metadata.as_ref(), local) {
        tracing::info!("{}", line);
    }

    HttpTransport::new(Arc::new(ctx))
        .serve(listener, shutdown_signal())
        .await?;

    tracing::info!("NeonVideo MCP server stopped");
    Ok(())
}

/// Startup lines about the metadata document. Nothing is served there when
/// OAuth is disabled, so nothing is announced.
fn metadata_announcements(published: Option<&Url>, local: SocketAddr) -> Vec<String> {
    let Some(published) = published else {
        return Vec::new();
    };
    let local_metadata = format!("http://{}{}", local, PROTECTED_RESOURCE_PATH);
    let mut lines = vec![format!("Protected resource metadata at {}", local_metadata)];
    if published.as_str() != local_metadata {
        lines.push(format!("Published metadata URL: {}", published));
    }
    lines
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
