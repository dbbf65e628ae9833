//! Core types shared across the generation pipeline
//!
//! - `CollectorSummary`: fused output of the data collectors
//! - `GenerationPrompt`: bounded prompt handed to the music backend
//! - `BackendError`: classified failure of any upstream HTTP call

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use lifesong_common::events::{Clip, ClipMetadata, ClipStatus};

/// Hard ceiling on the lyrical prompt, in characters
pub const MAX_PROMPT_CHARS: usize = 500;

/// Length above which the music backend has been observed to reject prompts,
/// despite advertising a much higher limit
pub const EFFECTIVE_BACKEND_PROMPT_CHARS: usize = 150;

/// Per-source item cap applied by every collector
pub const MAX_ITEMS_PER_SOURCE: usize = 10;

// ============================================================================
// Collector Output
// ============================================================================

/// One of the personal data sources fused into a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    MusicTaste,
    RecentEmails,
    MessageActivity,
}

impl SourceKind {
    /// Key used for this source in summaries and events
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::MusicTaste => "musicTaste",
            SourceKind::RecentEmails => "recentEmails",
            SourceKind::MessageActivity => "messageActivity",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top artist with its genres (deduplicated, backend order preserved)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistSummary {
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Top track with its first credited artist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub name: String,
    #[serde(default)]
    pub artist: String,
}

/// Music-taste collector output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicTaste {
    #[serde(default)]
    pub top_artists: Vec<ArtistSummary>,
    #[serde(default)]
    pub top_tracks: Vec<TrackSummary>,
}

impl MusicTaste {
    pub fn is_empty(&self) -> bool {
        self.top_artists.is_empty() && self.top_tracks.is_empty()
    }

    /// Enforce the per-source item cap
    pub fn bounded(mut self) -> Self {
        self.top_artists.truncate(MAX_ITEMS_PER_SOURCE);
        self.top_tracks.truncate(MAX_ITEMS_PER_SOURCE);
        self
    }
}

/// Inbound message summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSummary {
    pub subject: String,
    #[serde(default)]
    pub from: String,
}

/// Correspondence collector output (most recent first)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correspondence {
    #[serde(default)]
    pub recent_emails: Vec<EmailSummary>,
    #[serde(default)]
    pub count: usize,
}

impl Correspondence {
    pub fn new(mut recent_emails: Vec<EmailSummary>) -> Self {
        recent_emails.truncate(MAX_ITEMS_PER_SOURCE);
        let count = recent_emails.len();
        Self {
            recent_emails,
            count,
        }
    }
}

/// Fused collector output
///
/// Every field is optional; a source that failed or returned nothing is
/// simply absent. All three absent is a precondition violation for the
/// prompt synthesizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_taste: Option<MusicTaste>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_emails: Option<Vec<EmailSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_activity: Option<String>,
}

impl CollectorSummary {
    /// No source contributed anything
    pub fn is_empty(&self) -> bool {
        self.music_taste.as_ref().map_or(true, MusicTaste::is_empty)
            && self.recent_emails.as_ref().map_or(true, Vec::is_empty)
            && self
                .message_activity
                .as_ref()
                .map_or(true, |text| text.trim().is_empty())
    }

    /// Sources that carry data, in fusion order
    pub fn present_sources(&self) -> Vec<SourceKind> {
        let mut sources = Vec::new();
        if self.music_taste.as_ref().is_some_and(|m| !m.is_empty()) {
            sources.push(SourceKind::MusicTaste);
        }
        if self.recent_emails.as_ref().is_some_and(|e| !e.is_empty()) {
            sources.push(SourceKind::RecentEmails);
        }
        if self
            .message_activity
            .as_ref()
            .is_some_and(|t| !t.trim().is_empty())
        {
            sources.push(SourceKind::MessageActivity);
        }
        sources
    }
}

// ============================================================================
// Generation Prompt
// ============================================================================

/// Synthesized generation request: lyrical prompt plus style tags
///
/// Created once per pipeline run and immutable afterwards. The constructor
/// enforces the 500-character ceiling on `prompt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationPrompt {
    prompt: String,
    tags: String,
}

impl GenerationPrompt {
    pub fn new(prompt: impl AsRef<str>, tags: impl AsRef<str>) -> Self {
        let prompt = prompt.as_ref().trim();
        let char_count = prompt.chars().count();
        if char_count > MAX_PROMPT_CHARS {
            tracing::warn!(
                chars = char_count,
                limit = MAX_PROMPT_CHARS,
                "Synthesized prompt over ceiling, truncating"
            );
        }

        Self {
            prompt: truncate_chars(prompt, MAX_PROMPT_CHARS),
            tags: tags.as_ref().trim().to_string(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn tags(&self) -> &str {
        &self.tags
    }

    /// Comma-separated tag tokens, trimmed, empties dropped
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

// ============================================================================
// Backend Errors
// ============================================================================

/// Failure of an upstream HTTP call, classified for retry decisions
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Credential or endpoint missing from configuration
    #[error("{service} is not configured: {detail}")]
    NotConfigured {
        service: &'static str,
        detail: String,
    },

    /// 4xx response: the request itself is wrong, never retried
    #[error("{service} rejected request ({status}): {body}")]
    Client {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// 5xx response: transient, retryable
    #[error("{service} server error ({status}): {body}")]
    Server {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Connection, timeout or body read failure: transient, retryable
    #[error("{service} request failed: {detail}")]
    Transport {
        service: &'static str,
        detail: String,
    },

    /// 2xx with a body we could not use
    #[error("{service} returned an invalid response: {detail}")]
    InvalidResponse {
        service: &'static str,
        detail: String,
    },
}

impl BackendError {
    /// Classify a non-success status
    pub fn from_status(service: &'static str, status: StatusCode, body: String) -> Self {
        if status.is_server_error() {
            BackendError::Server {
                service,
                status: status.as_u16(),
                body,
            }
        } else {
            BackendError::Client {
                service,
                status: status.as_u16(),
                body,
            }
        }
    }

    pub fn transport(service: &'static str, err: reqwest::Error) -> Self {
        BackendError::Transport {
            service,
            detail: err.to_string(),
        }
    }

    pub fn invalid_response(service: &'static str, detail: impl Into<String>) -> Self {
        BackendError::InvalidResponse {
            service,
            detail: detail.into(),
        }
    }

    /// Server errors and transport failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Server { .. } | BackendError::Transport { .. }
        )
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Client { status, .. } | BackendError::Server { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
