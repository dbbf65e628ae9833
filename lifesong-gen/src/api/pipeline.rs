//! Pipeline session endpoints
//!
//! A run is started in the background and observed over SSE. Sessions stay
//! in the registry for a while after the run so late observers can replay.

use super::ApiResponse;
use crate::pipeline::{PipelineContext, PipelineRequest};
use crate::sessions::CancelOutcome;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPipelineData {
    pub session_id: Uuid,
    /// SSE path to observe this run
    pub events_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelPipelineData {
    pub session_id: Uuid,
    /// `false` when the run had already finished
    pub cancelled: bool,
}

/// POST /pipeline/start
pub async fn start_pipeline(
    State(state): State<AppState>,
    Json(request): Json<PipelineRequest>,
) -> ApiResult<Json<ApiResponse<StartPipelineData>>> {
    let pipeline = state.build_pipeline(&request)?;

    let ctx = PipelineContext::register(&state.sessions, state.event_bus.clone());
    let session_id = ctx.session_id;

    tokio::spawn(async move {
        tracing::info!(session_id = %session_id, "Background pipeline task started");

        let outcome = pipeline.run(&ctx).await;
        let final_state = ctx.sessions.finish(session_id);
        match outcome {
            Ok(clips) => tracing::debug!(
                session_id = %session_id,
                clips = clips.len(),
                state = ?final_state,
                "Pipeline session finished"
            ),
            Err(e) => tracing::debug!(
                session_id = %session_id,
                error = %e,
                state = ?final_state,
                "Pipeline session finished with error"
            ),
        }
    });

    Ok(Json(ApiResponse::ok(StartPipelineData {
        session_id,
        events_url: format!("/pipeline/events?sessionId={}", session_id),
    })))
}

/// POST /pipeline/cancel/:session_id
///
/// Stops local observation only; the remote generation keeps running.
pub async fn cancel_pipeline(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<CancelPipelineData>>> {
    let cancelled = match state.sessions.cancel(session_id) {
        CancelOutcome::Unknown => {
            return Err(ApiError::NotFound(format!("No pipeline session {}", session_id)));
        }
        CancelOutcome::Requested => {
            tracing::info!(session_id = %session_id, "Pipeline cancellation requested");
            true
        }
        CancelOutcome::AlreadyFinished(finished) => {
            tracing::debug!(session_id = %session_id, state = ?finished, "Cancel ignored, run already finished");
            false
        }
    };

    Ok(Json(ApiResponse::ok(CancelPipelineData {
        session_id,
        cancelled,
    })))
}

pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline/start", post(start_pipeline))
        .route("/pipeline/cancel/:session_id", post(cancel_pipeline))
        .route("/pipeline/events", get(super::sse::pipeline_event_stream))
}
