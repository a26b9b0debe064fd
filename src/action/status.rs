//! Status normalization.
//!
//! The video backend has reported progress under several field names and
//! vocabularies over time. [`normalize`] folds all of them into one
//! [`VideoState`], and [`status_view`] builds the widget's status view from a
//! raw payload.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::output::{ErrorDetail, ErrorKind, StatusView, timestamp};

/// Fields consulted, in order, for the raw status string.
const STATUS_FIELDS: [&str; 3] = ["status", "state", "generationStatus"];

const COMPLETE_WORDS: [&str; 4] = ["completed", "complete", "done", "finished"];
const ERROR_WORDS: [&str; 4] = ["failed", "error", "cancelled", "canceled"];
const QUEUED_WORDS: [&str; 3] = ["queued", "pending", "waiting"];

const FINAL_VIDEO_FIELDS: [&str; 2] = ["finalVideoUrl", "videoUrl"];
const AUDIO_FIELDS: [&str; 2] = ["audioUrl", "songUrl"];
const SCENE_IMAGE_FIELDS: [&str; 2] = ["sceneImages", "frames"];
const PROMPT_FIELDS: [&str; 3] = ["description", "prompt", "title"];

const GENERATION_FAILED: &str = "NeonVideo.AI reported an error while generating the video.";

/// Canonical project state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoState {
    Queued,
    Generating,
    Complete,
    Error,
}

impl VideoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoState::Queued => "queued",
            VideoState::Generating => "generating",
            VideoState::Complete => "complete",
            VideoState::Error => "error",
        }
    }

    /// Map a lowercased backend status word. Unrecognized words, and no word
    /// at all, mean the project is still generating.
    fn from_word(word: Option<&str>) -> Self {
        match word {
            Some(w) if COMPLETE_WORDS.contains(&w) => VideoState::Complete,
            Some(w) if ERROR_WORDS.contains(&w) => VideoState::Error,
            Some(w) if QUEUED_WORDS.contains(&w) => VideoState::Queued,
            _ => VideoState::Generating,
        }
    }
}

impl fmt::Display for VideoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of normalizing a status payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedStatus {
    /// The backend's own status word, lowercased.
    pub raw: Option<String>,
    pub state: VideoState,
    pub final_video_url: Option<String>,
}

impl NormalizedStatus {
    /// The raw word when the backend sent one, else the canonical state.
    pub fn label(&self) -> &str {
        self.raw.as_deref().unwrap_or(self.state.as_str())
    }
}

/// Normalize a status payload.
///
/// `isCompleted: true` or a completion word wins, then failure words, then
/// queue words; anything else is `generating`. A final video URL forces
/// `complete` unless the project failed.
pub fn normalize(payload: &Map<String, Value>) -> NormalizedStatus {
    let raw = raw_status(payload);
    let completed_flag = payload.get("isCompleted").and_then(Value::as_bool) == Some(true);

    let mut state = if completed_flag {
        VideoState::Complete
    } else {
        VideoState::from_word(raw.as_deref())
    };

    let final_video_url = first_string(payload, &FINAL_VIDEO_FIELDS);
    if final_video_url.is_some() && state != VideoState::Error {
        state = VideoState::Complete;
    }

    NormalizedStatus {
        raw,
        state,
        final_video_url,
    }
}

/// Build the status view for `requested_id` from a backend payload.
pub fn status_view(
    payload: &Map<String, Value>,
    requested_id: &str,
    poll_url: &str,
) -> (NormalizedStatus, StatusView) {
    let normalized = normalize(payload);

    let project_id = payload
        .get("id")
        .filter(|v| !v.is_null())
        .map(stringify)
        .unwrap_or_else(|| requested_id.to_string());
    let prompt = PROMPT_FIELDS
        .iter()
        .find_map(|field| payload.get(*field).filter(|v| !v.is_null()))
        .map(stringify)
        .unwrap_or_else(|| requested_id.to_string());
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("NeonVideo.AI status: {}", normalized.label()));

    let error = (normalized.state == VideoState::Error).then(|| {
        let message = ["error", "details"]
            .iter()
            .find_map(|field| payload.get(*field).and_then(Value::as_str))
            .unwrap_or(GENERATION_FAILED);
        ErrorDetail::new(ErrorKind::Api, message)
    });

    let view = StatusView {
        project_id,
        prompt,
        message,
        status: normalized.state,
        poll_url: poll_url.to_string(),
        checked_at: timestamp(),
        final_video_url: normalized.final_video_url.clone(),
        audio_url: first_string(payload, &AUDIO_FIELDS),
        scene_images: SCENE_IMAGE_FIELDS
            .iter()
            .find_map(|field| string_list(payload.get(*field))),
        scene_prompts: string_list(payload.get("scenePrompts")),
        credits_remaining: number(payload.get("creditsRemaining")),
        credits_required: number(payload.get("creditsRequired")),
        error,
    };

    (normalized, view)
}

/// First non-null, non-blank status word, lowercased.
fn raw_status(payload: &Map<String, Value>) -> Option<String> {
    STATUS_FIELDS
        .iter()
        .filter_map(|field| payload.get(*field).filter(|v| !v.is_null()))
        .map(|v| stringify(v).trim().to_lowercase())
        .find(|word| !word.is_empty())
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// First non-blank string among `fields`. Backends send `""` for URLs that
/// are not ready yet.
fn first_string(payload: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| payload.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// String elements of an array value; `None` when the value is not an array.
fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

fn number(value: Option<&Value>) -> Option<serde_json::Number> {
    match value? {
        Value::Number(n) => Some(n.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn state_of(value: Value) -> VideoState {
        normalize(&payload(value)).state
    }

    #[test]
    fn test_vocabularies() {
        assert_eq!(state_of(json!({"status": "done"})), VideoState::Complete);
        assert_eq!(state_of(json!({"status": "FINISHED"})), VideoState::Complete);
        assert_eq!(state_of(json!({"state": "waiting"})), VideoState::Queued);
        assert_eq!(state_of(json!({"generationStatus": "pending"})), VideoState::Queued);
        assert_eq!(state_of(json!({"status": "canceled"})), VideoState::Error);
        assert_eq!(state_of(json!({"status": "rendering"})), VideoState::Generating);
    }

    #[test]
    fn test_empty_payload_is_generating() {
        let normalized = normalize(&Map::new());
        assert_eq!(normalized.state, VideoState::Generating);
        assert!(normalized.raw.is_none());
        assert_eq!(normalized.label(), "generating");
    }

    #[test]
    fn test_field_precedence() {
        // status wins over state even when state is more specific
        assert_eq!(
            state_of(json!({"status": "processing", "state": "done"})),
            VideoState::Generating
        );
        // null fields are skipped
        assert_eq!(
            state_of(json!({"status": null, "state": "queued"})),
            VideoState::Queued
        );
    }

    #[test]
    fn test_completion_flag_wins() {
        assert_eq!(
            state_of(json!({"isCompleted": true, "status": "failed"})),
            VideoState::Complete
        );
        assert_eq!(
            state_of(json!({"isCompleted": "yes", "status": "queued"})),
            VideoState::Queued
        );
    }

    #[test]
    fn test_deliverable_forces_complete() {
        let normalized = normalize(&payload(json!({
            "finalVideoUrl": "https://x",
            "status": "processing"
        })));
        assert_eq!(normalized.state, VideoState::Complete);
        assert_eq!(normalized.final_video_url.as_deref(), Some("https://x"));

        assert_eq!(
            state_of(json!({"videoUrl": "https://x", "state": "queued"})),
            VideoState::Complete
        );
        // a failed project stays failed
        assert_eq!(
            state_of(json!({"videoUrl": "https://x", "status": "error"})),
            VideoState::Error
        );
    }

    #[test]
    fn test_blank_video_url_is_not_a_deliverable() {
        let normalized = normalize(&payload(json!({
            "status": "processing",
            "finalVideoUrl": ""
        })));
        assert_eq!(normalized.state, VideoState::Generating);
        assert!(normalized.final_video_url.is_none());

        let normalized = normalize(&payload(json!({
            "status": "processing",
            "finalVideoUrl": "  ",
            "videoUrl": "https://cdn/v.mp4"
        })));
        assert_eq!(normalized.state, VideoState::Complete);
        assert_eq!(normalized.final_video_url.as_deref(), Some("https://cdn/v.mp4"));
    }

    #[test]
    fn test_blank_status_word_is_absent() {
        let normalized = normalize(&payload(json!({"status": ""})));
        assert!(normalized.raw.is_none());
        assert_eq!(normalized.state, VideoState::Generating);
        assert_eq!(normalized.label(), "generating");

        assert_eq!(
            state_of(json!({"status": " ", "state": "queued"})),
            VideoState::Queued
        );

        let (_, view) = status_view(&payload(json!({"status": ""})), "p-1", "https://x/p-1");
        assert_eq!(view.message, "NeonVideo.AI status: generating");
    }

    #[test]
    fn test_non_string_status_is_stringified() {
        let normalized = normalize(&payload(json!({"status": 3})));
        assert_eq!(normalized.raw.as_deref(), Some("3"));
        assert_eq!(normalized.state, VideoState::Generating);
    }

    #[test]
    fn test_status_view_aliases() {
        let (_, view) = status_view(
            &payload(json!({
                "title": "Cowboy mouse",
                "status": "processing",
                "songUrl": "https://cdn/song.mp3",
                "frames": ["https://cdn/1.png", 7, "https://cdn/2.png"],
                "scenePrompts": ["a barn"],
                "creditsRemaining": 40,
                "creditsRequired": 2.5
            })),
            "p-1",
            "https://neonvideo.ai/api/neon-single-prompt/status/p-1",
        );
        assert_eq!(view.project_id, "p-1");
        assert_eq!(view.prompt, "Cowboy mouse");
        assert_eq!(view.message, "NeonVideo.AI status: processing");
        assert_eq!(view.status, VideoState::Generating);
        assert_eq!(view.audio_url.as_deref(), Some("https://cdn/song.mp3"));
        assert_eq!(
            view.scene_images,
            Some(vec!["https://cdn/1.png".to_string(), "https://cdn/2.png".to_string()])
        );
        assert_eq!(view.scene_prompts, Some(vec!["a barn".to_string()]));
        assert_eq!(view.credits_remaining, Some(40.into()));
        assert_eq!(
            serde_json::to_value(&view.credits_required).unwrap(),
            json!(2.5)
        );
        assert!(view.error.is_none());
    }

    #[test]
    fn test_status_view_prefers_payload_identity() {
        let (_, view) = status_view(
            &payload(json!({"id": 99, "description": "desc", "message": "Rendering scene 3"})),
            "requested",
            "https://x/status/requested",
        );
        assert_eq!(view.project_id, "99");
        assert_eq!(view.prompt, "desc");
        assert_eq!(view.message, "Rendering scene 3");
        assert_eq!(view.poll_url, "https://x/status/requested");
    }

    #[test]
    fn test_status_view_error_detail() {
        let (_, view) = status_view(&payload(json!({"status": "failed"})), "p", "https://x");
        let error = view.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Api);
        assert_eq!(error.message, GENERATION_FAILED);

        let (_, view) = status_view(
            &payload(json!({"status": "failed", "details": "out of credits"})),
            "p",
            "https://x",
        );
        assert_eq!(view.error.unwrap().message, "out of credits");
    }
}
