//! HTTP API handlers for lifesong-gen
//!
//! Every JSON endpoint answers `{"success": true, "data": ...}` or, through
//! `ApiError`, `{"success": false, "error": "..."}`.

pub mod collectors;
pub mod generation;
pub mod health;
pub mod pipeline;
pub mod sse;
pub mod transcribe;

pub use collectors::collector_routes;
pub use generation::generation_routes;
pub use health::health_routes;
pub use pipeline::pipeline_routes;
pub use sse::event_stream;
pub use transcribe::transcribe_routes;

use serde::Serialize;

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }

    /// Gracefully degraded result: 200 status, usable but incomplete data
    pub fn degraded(data: T) -> Self {
        Self {
            success: false,
            data,
        }
    }
}

/// Required string field: present and not blank
pub(crate) fn required<'a>(value: &'a Option<String>, message: &str) -> crate::ApiResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| crate::ApiError::BadRequest(message.to_string()))
}
