//! In-memory registry of pipeline sessions
//!
//! Each session keeps its cancellation token and the events it has emitted
//! so a client that opens `/pipeline/events` after `/pipeline/start`
//! returned still sees the whole run, including the final event.
//!
//! Publishing and subscribing both happen under the registry lock: an event
//! is either in the replayed history or delivered live, never both and
//! never neither. Finished sessions are dropped after `SESSION_RETENTION`.

use lifesong_common::events::{EventBus, LifesongEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How long a finished session stays available for replay
pub const SESSION_RETENTION: Duration = Duration::from_secs(600);

/// Lifecycle of one session as seen by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    fn from_final(event: &LifesongEvent) -> Option<Self> {
        match event {
            LifesongEvent::PipelineCompleted { .. } => Some(SessionState::Completed),
            LifesongEvent::PipelineFailed { .. } => Some(SessionState::Failed),
            LifesongEvent::PipelineCancelled { .. } => Some(SessionState::Cancelled),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        *self == SessionState::Running
    }
}

/// Outcome of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Unknown,
    Requested,
    AlreadyFinished(SessionState),
}

struct SessionEntry {
    cancel: CancellationToken,
    history: Vec<LifesongEvent>,
    state: SessionState,
    finished_at: Option<Instant>,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves the map itself consistent
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new running session and return its cancellation token
    pub fn register(&self, session_id: Uuid) -> CancellationToken {
        let cancel = CancellationToken::new();
        let mut sessions = self.lock();
        prune_expired(&mut sessions);
        sessions.insert(
            session_id,
            SessionEntry {
                cancel: cancel.clone(),
                history: Vec::new(),
                state: SessionState::Running,
                finished_at: None,
            },
        );
        cancel
    }

    /// Record the event for its session (when registered) and broadcast it
    pub fn publish(&self, event_bus: &EventBus, event: LifesongEvent) {
        let mut sessions = self.lock();
        if let Some(entry) = sessions.get_mut(&event.session_id()) {
            if let Some(state) = SessionState::from_final(&event) {
                entry.state = state;
            }
            entry.history.push(event.clone());
        }
        event_bus.emit_lossy(event);
    }

    /// Mark a session's run as over; starts its retention window
    pub fn finish(&self, session_id: Uuid) -> Option<SessionState> {
        let mut sessions = self.lock();
        let entry = sessions.get_mut(&session_id)?;
        entry.finished_at = Some(Instant::now());
        Some(entry.state)
    }

    /// Subscribe to live events and snapshot the history atomically
    ///
    /// `None` when the session is unknown or already expired.
    pub fn subscribe(
        &self,
        session_id: Uuid,
        event_bus: &EventBus,
    ) -> Option<(Vec<LifesongEvent>, broadcast::Receiver<LifesongEvent>)> {
        let sessions = self.lock();
        let entry = sessions.get(&session_id)?;
        Some((entry.history.clone(), event_bus.subscribe()))
    }

    pub fn cancel(&self, session_id: Uuid) -> CancelOutcome {
        let sessions = self.lock();
        match sessions.get(&session_id) {
            None => CancelOutcome::Unknown,
            Some(entry) if entry.state.is_running() => {
                entry.cancel.cancel();
                CancelOutcome::Requested
            }
            Some(entry) => CancelOutcome::AlreadyFinished(entry.state),
        }
    }

    pub fn state(&self, session_id: Uuid) -> Option<SessionState> {
        self.lock().get(&session_id).map(|entry| entry.state)
    }
}

fn prune_expired(sessions: &mut HashMap<Uuid, SessionEntry>) {
    let before = sessions.len();
    sessions.retain(|_, entry| {
        entry
            .finished_at
            .map_or(true, |at| at.elapsed() < SESSION_RETENTION)
    });
    let pruned = before - sessions.len();
    if pruned > 0 {
        tracing::debug!(pruned, "Dropped expired pipeline sessions");
    }
}
