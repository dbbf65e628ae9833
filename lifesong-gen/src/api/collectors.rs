//! Per-collector endpoints
//!
//! Token-based collectors fail with 400 when the token is missing and 500
//! when the upstream call fails. The message store never fails: a read
//! error comes back as 200 with `success: false` and a diagnostic.

use super::{required, ApiResponse};
use crate::collectors::ConversationExtract;
use crate::types::{Correspondence, MusicTaste};
use crate::{ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// POST /spotify/data
pub async fn spotify_data(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> ApiResult<Json<ApiResponse<MusicTaste>>> {
    let token = required(&request.access_token, "Access token is required")?;
    let taste = state.spotify_collector(token).fetch().await?;

    tracing::info!(
        artists = taste.top_artists.len(),
        tracks = taste.top_tracks.len(),
        "Fetched music taste"
    );
    Ok(Json(ApiResponse::ok(taste)))
}

/// POST /gmail/data
pub async fn gmail_data(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> ApiResult<Json<ApiResponse<Correspondence>>> {
    let token = required(&request.access_token, "Access token is required")?;
    let correspondence = state.gmail_collector(token).fetch().await?;

    tracing::info!(count = correspondence.count, "Fetched recent emails");
    Ok(Json(ApiResponse::ok(correspondence)))
}

/// POST /imessage/data
pub async fn imessage_data(State(state): State<AppState>) -> Json<ApiResponse<ConversationExtract>> {
    let extract = state.message_collector().extract().await;
    if extract.is_ok() {
        Json(ApiResponse::ok(extract))
    } else {
        Json(ApiResponse::degraded(extract))
    }
}

pub fn collector_routes() -> Router<AppState> {
    Router::new()
        .route("/spotify/data", post(spotify_data))
        .route("/gmail/data", post(gmail_data))
        .route("/imessage/data", post(imessage_data))
}
