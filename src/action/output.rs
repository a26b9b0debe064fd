//! Structured tool output.
//!
//! Every call of the NeonVideo tool yields a text line for the conversation
//! and exactly one [`StructuredOutput`] view for the widget.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::VideoState;
use crate::protocol::CallToolResult;

/// `_meta` key carrying a `WWW-Authenticate` value for the client to surface.
pub const WWW_AUTHENTICATE_META: &str = "mcp/www_authenticate";

/// Current time as an RFC 3339 timestamp with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Category of a failed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No usable NeonVideo credential, or the backend refused it
    Auth,
    /// The caller's arguments were unusable
    Validation,
    /// The backend could not be reached in time
    Network,
    /// The backend answered with something unexpected
    Api,
    /// Unrecognized action
    Unknown,
}

/// Failure envelope shared by every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            status: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub syntax: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpView {
    pub title: String,
    pub timestamp: String,
    pub commands: Vec<Command>,
    pub usage_notes: Vec<String>,
}

/// Progress of one NeonVideo project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub project_id: String,
    pub prompt: String,
    pub message: String,
    pub status: VideoState,
    pub poll_url: String,
    pub checked_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_prompts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_remaining: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_required: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorView {
    pub timestamp: String,
    pub error: ErrorDetail,
}

/// The `structuredContent` of a tool result, tagged by `view`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum StructuredOutput {
    Help(HelpView),
    Status(StatusView),
    Error(ErrorView),
}

impl StructuredOutput {
    pub fn error(error: ErrorDetail) -> Self {
        StructuredOutput::Error(ErrorView {
            timestamp: timestamp(),
            error,
        })
    }

    /// The error detail of an error view, or of a status view reporting a
    /// failed generation.
    pub fn error_detail(&self) -> Option<&ErrorDetail> {
        match self {
            StructuredOutput::Error(view) => Some(&view.error),
            StructuredOutput::Status(view) => view.error.as_ref(),
            StructuredOutput::Help(_) => None,
        }
    }
}

/// Everything an action produced for one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub text: String,
    pub structured: StructuredOutput,
    /// Bearer challenge for the caller to re-authenticate with.
    pub challenge: Option<String>,
}

impl ToolOutcome {
    pub fn new(text: impl Into<String>, structured: StructuredOutput) -> Self {
        Self {
            text: text.into(),
            structured,
            challenge: None,
        }
    }

    /// A failed action: `text` for the conversation, `error` for the widget.
    pub fn failure(text: impl Into<String>, error: ErrorDetail) -> Self {
        Self::new(text, StructuredOutput::error(error))
    }

    pub fn with_challenge(mut self, challenge: Option<String>) -> Self {
        self.challenge = challenge;
        self
    }

    /// Convert into a tool result. Action failures are reported in the
    /// structured error view, never as `isError`.
    pub fn into_call_tool_result(self) -> CallToolResult {
        let structured = serde_json::to_value(&self.structured).unwrap_or(Value::Null);
        let result = CallToolResult::text(self.text).with_structured(structured);
        match self.challenge {
            Some(challenge) => result.with_meta(WWW_AUTHENTICATE_META, Value::String(challenge)),
            None => result,
        }
    }
}
