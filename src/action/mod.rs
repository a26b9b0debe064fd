//! The `neonvideo_action` tool.
//!
//! [`dispatch`] runs one of three actions and always returns a
//! [`ToolOutcome`]. Failures are recovered into the structured error view so
//! the calling agent can render them; nothing in here fails the tool call
//! itself.
//!
//! | action           | backend call                              | success view |
//! |------------------|-------------------------------------------|--------------|
//! | `help` (default) | none                                      | `help`       |
//! | `generate_video` | `POST /api/neon-single-prompt`            | `status`     |
//! | `check_status`   | `GET /api/neon-single-prompt/status/{id}` | `status`     |

pub mod backend;
pub mod output;
pub mod status;

use std::borrow::Cow;

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::oauth::{AuthInfo, ChallengeCode};
use crate::secret::SecretString;
use backend::{BackendResponse, Credentials};
use output::{Command, ErrorDetail, ErrorKind, HelpView, StatusView, StructuredOutput, ToolOutcome};

pub use backend::{BackendError, VideoApiClient};
pub use output::WWW_AUTHENTICATE_META;
pub use status::{NormalizedStatus, VideoState, normalize};

/// Name under which the tool is listed.
pub const TOOL_NAME: &str = "neonvideo_action";

/// Product name used in titles and messages.
pub const APP_NAME: &str = "NeonVideo.AI";

/// Prompts shorter than both limits are sent back for more detail.
pub const MIN_PROMPT_WORDS: usize = 8;
pub const MIN_PROMPT_CHARS: usize = 60;

const PROMPT_GUIDANCE: &str = "Template: Create a music video of [Character] [Video description]\nExample: Create a music video of a 3D animated cowboy mouse living on a farm.";

const START_PROJECT: &str = "Start a new NeonVideo project using the provided prompt.";

/// Which action to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    Help,
    GenerateVideo,
    CheckStatus,
    /// Anything else, kept so it can be reported back.
    #[serde(untagged)]
    Unknown(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Help => "help",
            Action::GenerateVideo => "generate_video",
            Action::CheckStatus => "check_status",
            Action::Unknown(other) => other,
        }
    }
}

impl JsonSchema for Action {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("NeonVideoAction")
    }

    fn inline_schema() -> bool {
        true
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "string",
            "enum": ["help", "generate_video", "check_status"],
            "default": "help",
            "description": "NeonVideo.AI action to execute"
        })
    }
}

/// Arguments of the `neonvideo_action` tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(default)]
    pub action: Action,
    /// Detailed natural language description of the desired music video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Identifier returned by the NeonVideo API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Override bearer token to reach the NeonVideo API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<SecretString>,
}

impl ActionRequest {
    /// Trim every text argument; blank ones become `None`.
    pub fn normalized(self) -> Self {
        Self {
            action: self.action,
            prompt: non_blank(self.prompt),
            project_id: non_blank(self.project_id),
            auth_token: SecretString::non_blank(
                self.auth_token.as_ref().map(SecretString::expose),
                "TOKEN",
            ),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Whether a prompt carries enough detail to send to the backend.
pub fn prompt_has_detail(prompt: &str) -> bool {
    let prompt = prompt.trim();
    prompt.split_whitespace().count() >= MIN_PROMPT_WORDS
        || prompt.chars().count() >= MIN_PROMPT_CHARS
}

/// Run one action.
///
/// `auth` is the identity the authorization middleware attached, if any. Its
/// token is forwarded to the backend unless the call names its own.
pub async fn dispatch(
    ctx: &AppContext,
    request: ActionRequest,
    auth: Option<&AuthInfo>,
) -> ToolOutcome {
    let request = request.normalized();
    let credentials = effective_credentials(ctx, &request, auth);

    tracing::info!(
        action = request.action.as_str(),
        client_id = auth.map(|a| a.client_id.as_str()),
        has_credentials = !credentials.is_empty(),
        "dispatching action"
    );

    match &request.action {
        Action::Help => help(ctx),
        Action::GenerateVideo => {
            generate_video(ctx, request.prompt.as_deref(), &credentials).await
        }
        Action::CheckStatus => {
            check_status(ctx, request.project_id.as_deref(), &credentials).await
        }
        Action::Unknown(other) => ToolOutcome::failure(
            "Unknown NeonVideo action.",
            ErrorDetail::new(ErrorKind::Unknown, format!("Unsupported action {}", other)),
        ),
    }
}

/// Per-call token, then the session's token, then the process-wide token.
/// The fallback cookie is always sent when configured.
fn effective_credentials(
    ctx: &AppContext,
    request: &ActionRequest,
    auth: Option<&AuthInfo>,
) -> Credentials {
    let token = request
        .auth_token
        .clone()
        .or_else(|| auth.map(|a| a.token.clone()).filter(|t| !t.is_empty()))
        .or_else(|| ctx.fallback().token.clone());
    Credentials {
        token,
        cookie: ctx.fallback().cookie.clone(),
    }
}

fn help(ctx: &AppContext) -> ToolOutcome {
    let auth_note = if ctx.oauth_enabled() {
        "Complete the NeonVideo OAuth prompt in ChatGPT when requested; this issues an access token automatically."
    } else {
        "Authenticate at https://neonvideo.ai/ to obtain an auth token before launching new videos."
    };

    let commands = [
        ("@NeonVideo Create a music video of <description>", START_PROJECT),
        ("@NeonVideo Make a music video about <description>", START_PROJECT),
        (
            "@NeonVideo Help",
            "Show available commands and authentication guidance.",
        ),
    ];

    let view = HelpView {
        title: format!("{} Commands", APP_NAME),
        timestamp: output::timestamp(),
        commands: commands
            .iter()
            .map(|(syntax, description)| Command {
                syntax: syntax.to_string(),
                description: description.to_string(),
            })
            .collect(),
        usage_notes: vec![
            auth_note.to_string(),
            "Each music video consumes credits; ensure your NeonVideo account has enough balance."
                .to_string(),
            "Generations typically finish in about 10 minutes; the widget auto-refreshes progress for up to 30 minutes."
                .to_string(),
            "For best results, follow the template: Create a music video of [Character] [Video description]."
                .to_string(),
        ],
    };

    ToolOutcome::new(
        "Here are the NeonVideo.AI commands you can use. Launch a video using the widget below.",
        StructuredOutput::Help(view),
    )
}

async fn generate_video(
    ctx: &AppContext,
    prompt: Option<&str>,
    credentials: &Credentials,
) -> ToolOutcome {
    let Some(prompt) = prompt else {
        return ToolOutcome::failure(
            "Please provide a detailed prompt describing the music video you want NeonVideo.AI to create.",
            ErrorDetail::new(
                ErrorKind::Validation,
                "Prompt is required to create a NeonVideo project.",
            ),
        );
    };

    if !prompt_has_detail(prompt) {
        return ToolOutcome::failure(
            format!(
                "Please share a more descriptive prompt for NeonVideo.AI.\n{}",
                PROMPT_GUIDANCE
            ),
            ErrorDetail::new(ErrorKind::Validation, "Prompt needs more detail.")
                .with_details(PROMPT_GUIDANCE),
        );
    }

    if credentials.is_empty() {
        return missing_credentials(
            ctx,
            "NeonVideo.AI requires a valid OAuth session. Reconnect the NeonVideo app to continue.",
            "NeonVideo.AI requires authentication. Set NEONVIDEO_AUTH_TOKEN or NEONVIDEO_AUTH_COOKIE for the MCP server.",
            "Authenticate with NeonVideo.AI to launch video generation.",
        );
    }

    let preview: String = prompt
        .chars()
        .take(120)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    tracing::info!(prompt = %preview, "generate_video start");

    let response = match ctx.backend().create_project(prompt, credentials).await {
        Ok(response) => response,
        Err(e) => return network_failure(&e),
    };

    let Some(payload) = response.payload() else {
        tracing::warn!(status = response.status, "generate_video failed");
        let fallback = format!("NeonVideo API returned {} {}", response.status, response.reason);
        return backend_failure(ctx, &response, fallback.trim());
    };

    let project_id = payload
        .get("projectId")
        .filter(|v| !v.is_null())
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    if project_id.is_empty() {
        tracing::warn!(body = %response.body, "generate_video response missing projectId");
        return ToolOutcome::failure(
            "NeonVideo.AI did not provide a project identifier.",
            ErrorDetail::new(
                ErrorKind::Api,
                "NeonVideo API response was missing expected fields.",
            )
            .with_details(response.body.clone()),
        );
    }

    tracing::info!(project_id = %project_id, "generate_video accepted");

    let message = payload
        .get("message")
        .filter(|v| !v.is_null())
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "Video generation started".to_string());

    let view = StatusView {
        project_id: project_id.clone(),
        prompt: prompt.to_string(),
        message,
        status: VideoState::Queued,
        poll_url: ctx.backend().status_url(&project_id).to_string(),
        checked_at: output::timestamp(),
        final_video_url: None,
        audio_url: None,
        scene_images: None,
        scene_prompts: None,
        credits_remaining: None,
        credits_required: None,
        error: None,
    };

    ToolOutcome::new(
        format!(
            "NeonVideo.AI started generating your video (project {}). Use the widget to monitor progress.",
            project_id
        ),
        StructuredOutput::Status(view),
    )
}

async fn check_status(
    ctx: &AppContext,
    project_id: Option<&str>,
    credentials: &Credentials,
) -> ToolOutcome {
    let Some(project_id) = project_id else {
        return ToolOutcome::failure(
            "Provide a project ID so I can retrieve the latest status from NeonVideo.AI.",
            ErrorDetail::new(ErrorKind::Validation, "Project ID is required to check status."),
        );
    };

    if credentials.is_empty() {
        return missing_credentials(
            ctx,
            "NeonVideo.AI requires a valid OAuth session before checking project status. Reconnect the app and try again.",
            "Set NEONVIDEO_AUTH_TOKEN or NEONVIDEO_AUTH_COOKIE to check NeonVideo.AI project status.",
            "Authenticate with NeonVideo.AI to view project status.",
        );
    }

    tracing::info!(project_id, "check_status start");

    let response = match ctx.backend().project_status(project_id, credentials).await {
        Ok(response) => response,
        Err(e) => return network_failure(&e),
    };

    let Some(payload) = response.payload() else {
        tracing::warn!(project_id, status = response.status, "check_status failed");
        let fallback = format!("Failed to fetch project {} ({})", project_id, response.status);
        return backend_failure(ctx, &response, &fallback);
    };

    let poll_url = ctx.backend().status_url(project_id).to_string();
    let (normalized, view) = status::status_view(payload, project_id, &poll_url);

    tracing::info!(
        project_id = %view.project_id,
        raw = normalized.raw.as_deref(),
        normalized = %normalized.state,
        final_video = normalized.final_video_url.is_some(),
        "check_status complete"
    );

    let text = if normalized.state == VideoState::Complete {
        format!("Project {} is complete. Enjoy your NeonVideo!", view.project_id)
    } else {
        format!("Latest status from NeonVideo.AI: {}.", normalized.label())
    };

    ToolOutcome::new(text, StructuredOutput::Status(view))
}

/// No credential to forward. With OAuth on, the caller is asked to
/// re-authenticate through a challenge.
fn missing_credentials(
    ctx: &AppContext,
    oauth_message: &str,
    manual_message: &str,
    challenge_description: &str,
) -> ToolOutcome {
    let message = if ctx.oauth_enabled() {
        oauth_message
    } else {
        manual_message
    };
    ToolOutcome::failure(message, ErrorDetail::new(ErrorKind::Auth, message))
        .with_challenge(ctx.challenge(ChallengeCode::InvalidToken, challenge_description))
}

/// A non-2xx or non-JSON backend response.
fn backend_failure(ctx: &AppContext, response: &BackendResponse, fallback: &str) -> ToolOutcome {
    let kind = if response.is_auth_failure() {
        ErrorKind::Auth
    } else {
        ErrorKind::Api
    };
    let message = response.error_message().unwrap_or(fallback).to_string();

    let mut detail = ErrorDetail::new(kind, message.clone()).with_status(response.status);
    if !response.body.is_empty() {
        detail = detail.with_details(response.body.clone());
    }

    let challenge = match response.status {
        401 => ctx.challenge(
            ChallengeCode::InvalidToken,
            "Access token was rejected by NeonVideo.AI.",
        ),
        403 => ctx.challenge(
            ChallengeCode::InsufficientScope,
            "Access token lacks required NeonVideo scopes.",
        ),
        _ => None,
    };

    ToolOutcome::failure(message, detail).with_challenge(challenge)
}

fn network_failure(error: &BackendError) -> ToolOutcome {
    let message = error.to_string();
    ToolOutcome::failure(message.clone(), ErrorDetail::new(ErrorKind::Network, message))
}
