//! Process configuration.
//!
//! Every setting can be given as a command-line flag or an environment
//! variable. Blank values count as absent.

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::action::backend::Credentials;
use crate::oauth::OAuthSettings;
use crate::secret::SecretString;

/// Default NeonVideo API origin.
pub const DEFAULT_API_BASE_URL: &str = "https://neonvideo.ai";

#[derive(Parser, Debug, Clone)]
#[command(name = "neonvideo-mcp")]
#[command(
    about = "MCP server for NeonVideo.AI music videos, guarded by OAuth bearer tokens",
    long_about = None
)]
pub struct Settings {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Base URL of the NeonVideo API
    #[arg(long, env = "NEONVIDEO_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: Url,

    /// Backend request timeout in milliseconds
    #[arg(long, env = "NEONVIDEO_API_TIMEOUT_MS", default_value_t = 60_000)]
    pub api_timeout_ms: u64,

    /// Fallback backend token, used when a call carries none
    #[arg(long, env = "NEONVIDEO_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Fallback backend session cookie
    #[arg(long, env = "NEONVIDEO_AUTH_COOKIE", hide_env_values = true)]
    pub auth_cookie: Option<String>,

    /// Log level
    #[arg(short, long, env = "NEONVIDEO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(flatten)]
    pub oauth: OAuthSettings,
}

impl Settings {
    /// Address to bind, as `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    /// Credentials from the environment, trimmed, blanks dropped.
    pub fn fallback_credentials(&self) -> Credentials {
        Credentials {
            token: SecretString::non_blank(self.auth_token.as_deref(), "NEONVIDEO_AUTH_TOKEN"),
            cookie: SecretString::non_blank(self.auth_cookie.as_deref(), "NEONVIDEO_AUTH_COOKIE"),
        }
    }
}
