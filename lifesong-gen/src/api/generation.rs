//! Prompt synthesis, music generation and clip status endpoints

use super::{required, ApiResponse};
use crate::http::ensure_success;
use crate::types::{BackendError, Clip, CollectorSummary, Correspondence, GenerationPrompt, MusicTaste};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

const AUDIO_SERVICE: &str = "Audio proxy";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePromptRequest {
    #[serde(default)]
    pub spotify_data: Option<MusicTaste>,
    #[serde(default)]
    pub gmail_data: Option<Correspondence>,
    #[serde(default)]
    pub message_activity: Option<String>,
    #[serde(default)]
    pub include_messages: bool,
}

impl GeneratePromptRequest {
    fn into_summary(self) -> CollectorSummary {
        CollectorSummary {
            music_taste: self.spotify_data.map(MusicTaste::bounded),
            recent_emails: self
                .gmail_data
                .map(|mail| Correspondence::new(mail.recent_emails).recent_emails),
            message_activity: self.message_activity,
        }
    }
}

/// POST /generate-prompt
pub async fn generate_prompt(
    State(state): State<AppState>,
    Json(request): Json<GeneratePromptRequest>,
) -> ApiResult<Json<ApiResponse<GenerationPrompt>>> {
    let synthesizer = state.synthesizer()?;
    let include_messages = request.include_messages;
    let summary = request.into_summary();

    let prompt = synthesizer.synthesize(&summary, include_messages).await?;
    Ok(Json(ApiResponse::ok(prompt)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMusicRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub make_instrumental: bool,
}

#[derive(Debug, Serialize)]
pub struct ClipsData {
    pub clips: Vec<Clip>,
}

/// POST /generate-music
///
/// Submits only; callers poll `GET /clips` or use the pipeline endpoints.
pub async fn generate_music(
    State(state): State<AppState>,
    Json(request): Json<GenerateMusicRequest>,
) -> ApiResult<Json<ApiResponse<ClipsData>>> {
    let prompt = required(&request.prompt, "Prompt is required")?;
    let orchestrator = state.orchestrator()?;

    let prompt = GenerationPrompt::new(prompt, request.tags.as_deref().unwrap_or_default());
    let clip = orchestrator.submit(&prompt, request.make_instrumental).await?;

    Ok(Json(ApiResponse::ok(ClipsData { clips: vec![clip] })))
}

#[derive(Debug, Deserialize)]
pub struct ClipsQuery {
    #[serde(default)]
    pub ids: Option<String>,
}

/// GET /clips?ids=a,b
pub async fn get_clips(
    State(state): State<AppState>,
    Query(query): Query<ClipsQuery>,
) -> ApiResult<Json<ApiResponse<ClipsData>>> {
    let ids: Vec<String> = query
        .ids
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect();

    if ids.is_empty() {
        return Err(ApiError::BadRequest("Clip ids are required".to_string()));
    }

    let backend = state
        .music_backend
        .clone()
        .ok_or_else(|| ApiError::NotConfigured("Suno API key not configured".to_string()))?;
    let clips = backend.fetch_clips(&ids).await?;

    Ok(Json(ApiResponse::ok(ClipsData { clips })))
}

#[derive(Debug, Deserialize)]
pub struct AudioProxyQuery {
    #[serde(default)]
    pub url: Option<String>,
}

/// GET /audio-proxy?url=
///
/// CORS headers come from the router-wide `CorsLayer`.
pub async fn audio_proxy(
    State(state): State<AppState>,
    Query(query): Query<AudioProxyQuery>,
) -> ApiResult<Response> {
    let url = required(&query.url, "Audio URL is required")?;

    let response = state
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| BackendError::transport(AUDIO_SERVICE, e))?;
    let response = ensure_success(AUDIO_SERVICE, response).await?;
    let audio = response
        .bytes()
        .await
        .map_err(|e| BackendError::transport(AUDIO_SERVICE, e))?;

    tracing::debug!(bytes = audio.len(), "Proxied audio");

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Body::from(audio),
    )
        .into_response())
}

pub fn generation_routes() -> Router<AppState> {
    Router::new()
        .route("/generate-prompt", post(generate_prompt))
        .route("/generate-music", post(generate_music))
        .route("/clips", get(get_clips))
        .route("/audio-proxy", get(audio_proxy))
}
