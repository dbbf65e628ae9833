//! Prompt synthesizer
//!
//! Fuses a `CollectorSummary` into one instruction for the text backend and
//! turns the reply into a `GenerationPrompt`. Style tags come only from
//! music taste; lyrical content only from correspondence and conversation.

pub mod parse;

pub use parse::{parse_reply, ParseOutcome, FALLBACK_PROMPT, FALLBACK_TAGS};

use crate::llm_client::{TextGenerator, TextRequest};
use crate::types::{BackendError, CollectorSummary, GenerationPrompt, MAX_PROMPT_CHARS};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("At least one data source is required to synthesize a prompt")]
    NoSources,

    #[error("Prompt generation failed: {0}")]
    Backend(#[from] BackendError),
}

pub struct PromptSynthesizer {
    backend: Arc<dyn TextGenerator>,
    model: String,
    max_output_tokens: u32,
}

impl PromptSynthesizer {
    pub fn new(backend: Arc<dyn TextGenerator>, model: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            backend,
            model: model.into(),
            max_output_tokens,
        }
    }

    /// One backend call, no retries; parse noise never fails this stage
    pub async fn synthesize(
        &self,
        summary: &CollectorSummary,
        include_conversation: bool,
    ) -> Result<GenerationPrompt, SynthesisError> {
        let context = build_context(summary, include_conversation).ok_or(SynthesisError::NoSources)?;
        tracing::debug!(sources = ?summary.present_sources(), include_conversation, "Building prompt context");
        let request = TextRequest {
            model: self.model.clone(),
            max_output_tokens: self.max_output_tokens,
            prompt: build_instruction(&context),
        };

        let raw = self.backend.generate(&request).await?;
        let (prompt, outcome) = parse_reply(&raw);

        tracing::info!(
            outcome = ?outcome,
            chars = prompt.prompt().chars().count(),
            tags = %prompt.tags(),
            tag_count = prompt.tag_list().len(),
            "Prompt synthesized"
        );

        Ok(prompt)
    }
}

/// Structured context with absent sources omitted; `None` when nothing is left
pub fn build_context(summary: &CollectorSummary, include_conversation: bool) -> Option<Value> {
    let mut context = Map::new();

    if let Some(taste) = summary.music_taste.as_ref().filter(|t| !t.is_empty()) {
        context.insert(
            "musicTaste".to_string(),
            json!({
                "topArtists": taste.top_artists,
                "topTracks": taste.top_tracks,
            }),
        );
    }

    if let Some(emails) = summary.recent_emails.as_ref().filter(|e| !e.is_empty()) {
        let subjects: Vec<&str> = emails.iter().map(|e| e.subject.as_str()).collect();
        context.insert(
            "recentEmails".to_string(),
            json!({
                "subjects": subjects,
                "count": emails.len(),
            }),
        );
    }

    if include_conversation {
        if let Some(activity) = summary
            .message_activity
            .as_ref()
            .filter(|t| !t.trim().is_empty())
        {
            context.insert("messageActivity".to_string(), json!(activity));
        }
    }

    if context.is_empty() {
        None
    } else {
        Some(Value::Object(context))
    }
}

pub fn build_instruction(context: &Value) -> String {
    let pretty = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());

    format!(
        r#"You are a creative assistant that writes personalized song prompts for a music generation service.

Given this user's personal data:
{pretty}

Write a song prompt following these rules:
1. Tags: choose 2-3 musical genres or moods derived ONLY from the music taste data. If no music taste data is present, pick neutral, broadly appealing tags.
2. Prompt: write the lyrical theme and story derived ONLY from the email subjects and message activity. If neither is present, write about the listener's everyday life.
3. Never mention genres, instruments, tempo or any other musical style in the prompt. Style belongs in tags only.
4. The prompt must be at most {MAX_PROMPT_CHARS} characters.

Respond with ONLY this JSON object and nothing else:
{{
  "prompt": "lyrical theme and story for the song",
  "tags": "genre1, genre2, mood"
}}"#
    )
}
