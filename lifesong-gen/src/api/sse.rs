//! Server-Sent Events endpoints
//!
//! `/events` is a heartbeat-only connection monitor. `/pipeline/events`
//! forwards pipeline events, optionally filtered to one session. A filtered
//! stream first replays what the session has already emitted.

use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use lifesong_common::events::LifesongEvent;
use lifesong_common::sse::{create_heartbeat_sse_stream, keep_alive, HEARTBEAT_INTERVAL};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// GET /events
pub async fn event_stream() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    create_heartbeat_sse_stream("lifesong-gen")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineEventsQuery {
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// GET /pipeline/events[?sessionId=]
///
/// Streams PipelineStarted, CollectorFinished, PromptSynthesized,
/// GenerationSubmitted, ClipsUpdated and one final PipelineCompleted /
/// PipelineFailed / PipelineCancelled per session. Unknown or expired
/// sessions are a 404.
pub async fn pipeline_event_stream(
    State(state): State<AppState>,
    Query(query): Query<PipelineEventsQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    info!(session_id = ?query.session_id, "New SSE client connected to pipeline events");

    let filter = query.session_id;
    let (replay, mut rx) = match filter {
        Some(session_id) => state
            .sessions
            .subscribe(session_id, &state.event_bus)
            .ok_or_else(|| ApiError::NotFound(format!("No pipeline session {}", session_id)))?,
        None => (Vec::new(), state.event_bus.subscribe()),
    };
    debug!(
        replayed = replay.len(),
        subscribers = state.event_bus.subscriber_count(),
        "SSE: Pipeline subscription ready"
    );

    let stream = async_stream::stream! {
        let mut finished = false;
        for event in replay {
            if let Some(sse_event) = to_sse_event(&event) {
                yield Ok(sse_event);
            }
            if event.is_final() {
                info!(session_id = %event.session_id(), "SSE: Replayed finished session, closing stream");
                finished = true;
                break;
            }
        }

        while !finished {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    let event = match received {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "SSE: Client lagging, events dropped");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if filter.is_some_and(|id| id != event.session_id()) {
                        continue;
                    }

                    if let Some(sse_event) = to_sse_event(&event) {
                        yield Ok(sse_event);
                    }

                    if filter.is_some() && event.is_final() {
                        info!(session_id = %event.session_id(), "SSE: Session finished, closing stream");
                        finished = true;
                    }
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(keep_alive()))
}

fn to_sse_event(event: &LifesongEvent) -> Option<Event> {
    let event_type = event.event_type();
    match serde_json::to_string(event) {
        Ok(event_json) => {
            debug!("SSE: Broadcasting pipeline event: {}", event_type);
            Some(Event::default().event(event_type).data(event_json))
        }
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
            None
        }
    }
}
