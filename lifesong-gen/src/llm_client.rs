//! Generative-text backend client
//!
//! The prompt synthesizer depends only on the `TextGenerator` trait; the
//! Anthropic messages API is the production implementation.

use crate::http::{ensure_success, json_body};
use crate::types::BackendError;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "Anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Single-turn text generation request
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub model: String,
    pub max_output_tokens: u32,
    pub prompt: String,
}

/// Generative-text backend: instruction in, raw text reply out
///
/// The reply is returned untouched; parsing and fallback live in the
/// synthesizer.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &TextRequest) -> Result<String, BackendError>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic messages API client
pub struct AnthropicClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, request: &TextRequest) -> Result<String, BackendError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_output_tokens,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        tracing::debug!(model = %request.model, chars = request.prompt.len(), "Requesting text generation");

        let response = self
            .http
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        let parsed: MessagesResponse = json_body(SERVICE, response).await?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            tracing::warn!("Text backend returned no text content");
        }

        Ok(text)
    }
}
