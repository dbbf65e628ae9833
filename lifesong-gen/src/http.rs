//! Shared HTTP plumbing for upstream clients

use crate::types::BackendError;
use std::time::Duration;

const USER_AGENT: &str = concat!("lifesong-gen/", env!("CARGO_PKG_VERSION"));

/// Upper bound on any single upstream request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the shared upstream client
pub fn build_client() -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| BackendError::transport("HTTP client", e))
}

/// Pass through 2xx responses, classify everything else
pub async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(service, status = status.as_u16(), body = %body, "Upstream call failed");
    Err(BackendError::from_status(service, status, body))
}

/// Decode a JSON body, mapping failures to `InvalidResponse`
pub async fn json_body<T: serde::de::DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| BackendError::transport(service, e))?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::invalid_response(service, e.to_string()))
}
