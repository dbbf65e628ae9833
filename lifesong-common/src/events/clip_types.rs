//! Clip types shared by the generation backend client and event consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generation status of a clip as reported by the music backend
///
/// `Queued → Streaming → Complete`, or any non-terminal state `→ Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipStatus {
    /// Accepted by the backend, no audio yet
    #[serde(alias = "submitted")]
    Queued,
    /// Audio is being produced; `audio_url` may already be playable
    Streaming,
    /// Audio finalized (duration/tags metadata available)
    Complete,
    /// Backend reported failure
    Error,
}

impl ClipStatus {
    /// `Complete` and `Error` are terminal; polling stops for such clips
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClipStatus::Complete | ClipStatus::Error)
    }

    /// Whether a clip in this status can be handed to the caller for playback
    pub fn is_playable(&self) -> bool {
        matches!(self, ClipStatus::Streaming | ClipStatus::Complete)
    }
}

/// Metadata finalized by the backend on completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    /// Style tags the backend applied
    #[serde(default)]
    pub tags: Option<String>,
}

/// One unit of generated audio tracked by id and status
///
/// Never computed locally: every new value comes from re-fetching the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    pub status: ClipStatus,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: ClipMetadata,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Clip {
    /// Streaming or complete with an audio URL present
    pub fn has_playable_audio(&self) -> bool {
        self.status.is_playable() && self.audio_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ClipStatus::Queued.is_terminal());
        assert!(!ClipStatus::Streaming.is_terminal());
        assert!(ClipStatus::Complete.is_terminal());
        assert!(ClipStatus::Error.is_terminal());
    }

    #[test]
    fn test_deserialize_backend_clip() {
        let json = r#"{
            "id": "c-1",
            "status": "streaming",
            "audio_url": "https://cdn.example/c-1.mp3",
            "title": "Inbox Blues",
            "metadata": { "duration": null, "tags": "indie, mellow", "prompt": "ignored" },
            "created_at": "2025-01-02T03:04:05.000Z"
        }"#;

        let clip: Clip = serde_json::from_str(json).unwrap();
        assert_eq!(clip.status, ClipStatus::Streaming);
        assert!(clip.has_playable_audio());
        assert_eq!(clip.metadata.tags.as_deref(), Some("indie, mellow"));
        assert!(clip.created_at.is_some());
    }

    #[test]
    fn test_submitted_is_queued() {
        let clip: Clip = serde_json::from_str(r#"{"id": "c-2", "status": "submitted"}"#).unwrap();
        assert_eq!(clip.status, ClipStatus::Queued);
        assert!(!clip.has_playable_audio());
        assert_eq!(clip.metadata, ClipMetadata::default());
    }
}
