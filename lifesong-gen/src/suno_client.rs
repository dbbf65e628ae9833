//! Music generation backend client
//!
//! Two operations: submit a generation request, and fetch the current state
//! of a set of clips by id. The orchestrator drives polling on top of
//! `MusicBackend`.

use crate::http::{ensure_success, json_body};
use crate::types::{BackendError, Clip};
use serde::Serialize;

const SERVICE: &str = "Suno";

/// Generation request as sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    pub make_instrumental: bool,
}

#[async_trait::async_trait]
pub trait MusicBackend: Send + Sync {
    /// Submit a generation; returns the initial clip descriptor
    async fn create(&self, request: &GenerationRequest) -> Result<Clip, BackendError>;

    /// Current snapshot of the given clips
    async fn fetch_clips(&self, ids: &[String]) -> Result<Vec<Clip>, BackendError>;
}

pub struct SunoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SunoClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl MusicBackend for SunoClient {
    async fn create(&self, request: &GenerationRequest) -> Result<Clip, BackendError> {
        let url = format!("{}/generate", self.base_url);
        tracing::info!(
            chars = request.topic.chars().count(),
            tags = ?request.tags,
            instrumental = request.make_instrumental,
            "Submitting generation request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        let value: serde_json::Value = json_body(SERVICE, response).await?;

        if value.get("id").and_then(|id| id.as_str()).is_none() {
            return Err(BackendError::invalid_response(
                SERVICE,
                "generation response carries no clip id",
            ));
        }

        let clip: Clip = serde_json::from_value(value)
            .map_err(|e| BackendError::invalid_response(SERVICE, e.to_string()))?;

        tracing::info!(clip_id = %clip.id, status = ?clip.status, "Generation accepted");
        Ok(clip)
    }

    async fn fetch_clips(&self, ids: &[String]) -> Result<Vec<Clip>, BackendError> {
        let url = format!("{}/clips", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("ids", ids.join(","))])
            .send()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        json_body(SERVICE, response).await
    }
}
