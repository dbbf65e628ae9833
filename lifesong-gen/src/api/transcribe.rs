//! Transcription endpoint

use super::{required, ApiResponse};
use crate::{ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest {
    #[serde(default)]
    pub audio_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscribeData {
    pub text: String,
}

/// POST /transcribe
pub async fn transcribe(
    State(state): State<AppState>,
    Json(request): Json<TranscribeRequest>,
) -> ApiResult<Json<ApiResponse<TranscribeData>>> {
    let audio_url = required(&request.audio_url, "Audio URL is required")?;
    let client = state.transcription_client()?;

    let text = client.transcribe_url(audio_url).await?;
    tracing::info!(chars = text.chars().count(), "Transcription complete");

    Ok(Json(ApiResponse::ok(TranscribeData { text })))
}

pub fn transcribe_routes() -> Router<AppState> {
    Router::new().route("/transcribe", post(transcribe))
}
