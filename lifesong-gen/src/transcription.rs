//! Transcription helper
//!
//! Downloads audio from a URL and sends it to a Whisper-compatible
//! speech-to-text endpoint. Only the speech-to-text call is wrapped in
//! `retry_with_backoff`; the download is a single attempt.

use crate::http::ensure_success;
use crate::types::BackendError;
use lifesong_common::{retry_with_backoff, RetryError, RetryPolicy};
use reqwest::multipart::{Form, Part};
use thiserror::Error;

const SERVICE: &str = "Whisper";
const AUDIO_SERVICE: &str = "Audio source";
pub const DEFAULT_MODEL: &str = "whisper-1";

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Failed to fetch audio: {0}")]
    AudioFetch(BackendError),

    #[error(transparent)]
    Whisper(#[from] RetryError<BackendError>),
}

pub struct TranscriptionClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    policy: RetryPolicy,
}

impl TranscriptionClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Fetch audio from `audio_url` and transcribe it
    pub async fn transcribe_url(&self, audio_url: &str) -> Result<String, TranscriptionError> {
        let audio = self.fetch_audio(audio_url).await.map_err(TranscriptionError::AudioFetch)?;
        tracing::info!(bytes = audio.len(), "Fetched audio for transcription");
        self.transcribe_bytes(audio).await
    }

    /// Transcribe raw audio bytes with bounded retry
    pub async fn transcribe_bytes(&self, audio: Vec<u8>) -> Result<String, TranscriptionError> {
        let text = retry_with_backoff(
            "whisper transcription",
            &self.policy,
            BackendError::is_retryable,
            |_attempt| self.send_once(audio.clone()),
        )
        .await?;

        Ok(text.trim().to_string())
    }

    async fn fetch_audio(&self, audio_url: &str) -> Result<Vec<u8>, BackendError> {
        let response = self
            .http
            .get(audio_url)
            .send()
            .await
            .map_err(|e| BackendError::transport(AUDIO_SERVICE, e))?;
        let response = ensure_success(AUDIO_SERVICE, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::transport(AUDIO_SERVICE, e))?;
        Ok(bytes.to_vec())
    }

    async fn send_once(&self, audio: Vec<u8>) -> Result<String, BackendError> {
        let part = Part::bytes(audio)
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| BackendError::transport(SERVICE, e))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "text");

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        response
            .text()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))
    }
}
