//! Event types for the Lifesong event system
//!
//! Provides the pipeline event definitions and the EventBus used to fan
//! progress out to SSE clients.

mod clip_types;

pub use clip_types::{Clip, ClipMetadata, ClipStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Lifesong event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Every event belongs to one pipeline session; consumers filter by `session_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifesongEvent {
    /// Pipeline run accepted and collectors about to start
    PipelineStarted {
        session_id: Uuid,
        /// Sources requested for this run ("musicTaste", "recentEmails", "messageActivity")
        sources: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// One collector settled (success or graceful degradation)
    CollectorFinished {
        session_id: Uuid,
        source: String,
        /// False when the source was dropped from fusion
        ok: bool,
        item_count: usize,
        /// Diagnostic for degraded sources
        detail: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Prompt synthesizer produced the generation prompt
    PromptSynthesized {
        session_id: Uuid,
        prompt: String,
        tags: String,
        timestamp: DateTime<Utc>,
    },

    /// Music backend accepted the generation request
    GenerationSubmitted {
        session_id: Uuid,
        clip_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// New clip snapshot with at least one streaming or complete clip
    ///
    /// Each snapshot replaces the previous one; consumers must not accumulate.
    ClipsUpdated {
        session_id: Uuid,
        clips: Vec<Clip>,
        timestamp: DateTime<Utc>,
    },

    /// Every tracked clip reached a terminal state
    PipelineCompleted {
        session_id: Uuid,
        clips: Vec<Clip>,
        timestamp: DateTime<Utc>,
    },

    /// Fatal failure; `partial_clips` carries the best-known snapshot (may be empty)
    PipelineFailed {
        session_id: Uuid,
        error: String,
        partial_clips: Vec<Clip>,
        timestamp: DateTime<Utc>,
    },

    /// Caller stopped observing; the remote job is not aborted
    PipelineCancelled {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl LifesongEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            LifesongEvent::PipelineStarted { .. } => "PipelineStarted",
            LifesongEvent::CollectorFinished { .. } => "CollectorFinished",
            LifesongEvent::PromptSynthesized { .. } => "PromptSynthesized",
            LifesongEvent::GenerationSubmitted { .. } => "GenerationSubmitted",
            LifesongEvent::ClipsUpdated { .. } => "ClipsUpdated",
            LifesongEvent::PipelineCompleted { .. } => "PipelineCompleted",
            LifesongEvent::PipelineFailed { .. } => "PipelineFailed",
            LifesongEvent::PipelineCancelled { .. } => "PipelineCancelled",
        }
    }

    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            LifesongEvent::PipelineStarted { session_id, .. }
            | LifesongEvent::CollectorFinished { session_id, .. }
            | LifesongEvent::PromptSynthesized { session_id, .. }
            | LifesongEvent::GenerationSubmitted { session_id, .. }
            | LifesongEvent::ClipsUpdated { session_id, .. }
            | LifesongEvent::PipelineCompleted { session_id, .. }
            | LifesongEvent::PipelineFailed { session_id, .. }
            | LifesongEvent::PipelineCancelled { session_id, .. } => *session_id,
        }
    }

    /// Whether this is the last event a session will emit
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            LifesongEvent::PipelineCompleted { .. }
                | LifesongEvent::PipelineFailed { .. }
                | LifesongEvent::PipelineCancelled { .. }
        )
    }
}

/// Broadcast bus for Lifesong events
///
/// Thin wrapper over `tokio::sync::broadcast`. Cloning shares the channel.
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LifesongEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use lifesong_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LifesongEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Pipeline progress is fire-and-forget: nobody watching is not an error.
    pub fn emit_lossy(&self, event: LifesongEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(LifesongEvent::PipelineCancelled {
            session_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });

        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let session_id = Uuid::new_v4();

        bus.emit_lossy(LifesongEvent::GenerationSubmitted {
            session_id,
            clip_ids: vec!["c-1".to_string()],
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id(), session_id);
        assert_eq!(event.event_type(), "GenerationSubmitted");
        assert!(!event.is_final());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = LifesongEvent::PromptSynthesized {
            session_id: Uuid::nil(),
            prompt: "A song about deadlines".to_string(),
            tags: "indie, mellow".to_string(),
            timestamp: Utc::now(),
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PromptSynthesized");
        assert_eq!(json["tags"], "indie, mellow");
    }
}
