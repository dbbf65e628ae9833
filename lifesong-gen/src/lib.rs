//! lifesong-gen library interface
//!
//! Personalized song generation: collectors gather personal data, the
//! synthesizer turns it into a prompt, the orchestrator drives the music
//! backend until clips are ready.

pub mod api;
pub mod collectors;
pub mod config;
pub mod error;
pub mod http;
pub mod llm_client;
pub mod orchestrator;
pub mod pipeline;
pub mod sessions;
pub mod suno_client;
pub mod synthesizer;
pub mod transcription;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use crate::collectors::{Collector, GmailCollector, MessageStoreCollector, SpotifyCollector};
use crate::config::GenConfig;
use crate::llm_client::{AnthropicClient, TextGenerator};
use crate::orchestrator::{GenerationOrchestrator, PollConfig};
use crate::pipeline::{Pipeline, PipelineRequest};
use crate::sessions::SessionRegistry;
use crate::suno_client::{MusicBackend, SunoClient};
use crate::synthesizer::PromptSynthesizer;
use crate::transcription::TranscriptionClient;
use crate::types::BackendError;
use axum::Router;
use chrono::{DateTime, Utc};
use lifesong_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GenConfig>,
    /// Shared upstream HTTP client
    pub http: reqwest::Client,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// `None` when no Anthropic key is configured
    pub text_backend: Option<Arc<dyn TextGenerator>>,
    /// `None` when no Suno key is configured
    pub music_backend: Option<Arc<dyn MusicBackend>>,
    /// `None` when no OpenAI key is configured
    pub transcriber: Option<Arc<TranscriptionClient>>,
    /// Pipeline sessions: cancellation tokens plus replayable event history
    pub sessions: SessionRegistry,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Build state from configuration, wiring whichever backends have keys
    pub fn new(config: GenConfig, event_bus: EventBus) -> Result<Self, BackendError> {
        let http = http::build_client()?;
        let endpoints = &config.endpoints;

        let text_backend = config.anthropic_key().map(|key| {
            Arc::new(AnthropicClient::new(http.clone(), &endpoints.anthropic_url, key))
                as Arc<dyn TextGenerator>
        });
        let music_backend = config.suno_key().map(|key| {
            Arc::new(SunoClient::new(http.clone(), &endpoints.suno_base_url, key))
                as Arc<dyn MusicBackend>
        });
        let transcriber = config.openai_key().map(|key| {
            Arc::new(
                TranscriptionClient::new(http.clone(), &endpoints.whisper_url, key)
                    .with_model(&config.generation.transcription_model),
            )
        });

        for (name, configured) in [
            ("prompt generation", text_backend.is_some()),
            ("music generation", music_backend.is_some()),
            ("transcription", transcriber.is_some()),
        ] {
            if !configured {
                tracing::warn!("No API key configured for {}; endpoint will return 500", name);
            }
        }

        Ok(Self {
            config: Arc::new(config),
            http,
            event_bus,
            text_backend,
            music_backend,
            transcriber,
            sessions: SessionRegistry::new(),
            startup_time: Utc::now(),
        })
    }

    pub fn with_text_backend(mut self, backend: Arc<dyn TextGenerator>) -> Self {
        self.text_backend = Some(backend);
        self
    }

    pub fn with_music_backend(mut self, backend: Arc<dyn MusicBackend>) -> Self {
        self.music_backend = Some(backend);
        self
    }

    pub fn with_transcriber(mut self, transcriber: TranscriptionClient) -> Self {
        self.transcriber = Some(Arc::new(transcriber));
        self
    }

    pub fn synthesizer(&self) -> ApiResult<PromptSynthesizer> {
        let backend = self
            .text_backend
            .clone()
            .ok_or_else(|| ApiError::NotConfigured("Anthropic API key not configured".to_string()))?;
        let generation = &self.config.generation;
        Ok(PromptSynthesizer::new(
            backend,
            &generation.text_model,
            generation.max_output_tokens,
        ))
    }

    pub fn orchestrator(&self) -> ApiResult<GenerationOrchestrator> {
        let backend = self
            .music_backend
            .clone()
            .ok_or_else(|| ApiError::NotConfigured("Suno API key not configured".to_string()))?;
        Ok(GenerationOrchestrator::new(backend, self.poll_config()))
    }

    pub fn transcription_client(&self) -> ApiResult<Arc<TranscriptionClient>> {
        self.transcriber
            .clone()
            .ok_or_else(|| ApiError::NotConfigured("OpenAI API key not configured".to_string()))
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: self.config.generation.poll_interval(),
            max_wait: self.config.generation.max_wait(),
        }
    }

    pub fn spotify_collector(&self, access_token: &str) -> SpotifyCollector {
        SpotifyCollector::new(
            self.http.clone(),
            &self.config.endpoints.spotify_api_base,
            access_token,
        )
    }

    pub fn gmail_collector(&self, access_token: &str) -> GmailCollector {
        GmailCollector::new(
            self.http.clone(),
            &self.config.endpoints.gmail_api_base,
            access_token,
        )
    }

    pub fn message_collector(&self) -> MessageStoreCollector {
        let messages = &self.config.messages;
        MessageStoreCollector::new(
            messages.resolved_db_path(),
            messages.days_back,
            messages.max_messages,
        )
    }

    /// Assemble a pipeline for one request; fails before any network call
    /// when a backend or every source is missing
    pub fn build_pipeline(&self, request: &PipelineRequest) -> ApiResult<Pipeline> {
        let mut collectors: Vec<Box<dyn Collector>> = Vec::new();
        if let Some(token) = request.spotify_token.as_deref().filter(|t| !t.trim().is_empty()) {
            collectors.push(Box::new(self.spotify_collector(token)));
        }
        if let Some(token) = request.gmail_token.as_deref().filter(|t| !t.trim().is_empty()) {
            collectors.push(Box::new(self.gmail_collector(token)));
        }
        if request.include_messages {
            collectors.push(Box::new(self.message_collector()));
        }

        if collectors.is_empty() {
            return Err(ApiError::BadRequest(
                "At least one data source (spotifyToken, gmailToken or includeMessages) is required"
                    .to_string(),
            ));
        }

        Ok(Pipeline::new(collectors, self.synthesizer()?, self.orchestrator()?)
            .include_messages(request.include_messages)
            .make_instrumental(request.make_instrumental))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::collector_routes())
        .merge(api::generation_routes())
        .merge(api::transcribe_routes())
        .merge(api::pipeline_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
