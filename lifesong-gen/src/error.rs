//! Error types for lifesong-gen

use crate::orchestrator::GenerationError;
use crate::synthesizer::SynthesisError;
use crate::transcription::TranscriptionError;
use crate::types::BackendError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid request input (400)
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Required credential or endpoint not configured (500)
    #[error("{0}")]
    NotConfigured(String),

    /// Upstream call failed (500)
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_)
            | ApiError::Synthesis(SynthesisError::NoSources)
            | ApiError::Generation(GenerationError::EmptyPrompt) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "Request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
