//! Generation orchestrator
//!
//! Submits a `GenerationPrompt` to the music backend and polls the returned
//! clips until every one is terminal or the wall-clock bound is exceeded.
//!
//! **Algorithm:**
//! 1. Create: one clip descriptor back; missing id is fatal, never retried
//! 2. Poll on a fixed interval, one outstanding fetch at a time
//! 3. After each fetch, hand the snapshot to the progress callback when any
//!    clip is streaming or complete
//! 4. Stop when all clips are terminal (`Ok`), when `max_wait` is exceeded
//!    (`Timeout` carrying the last snapshot), or on cancellation
//!
//! Fetch failures: 4xx is fatal; 5xx and transport failures are logged and
//! the next poll proceeds. Cancellation only stops local observation; the
//! remote job keeps running.

use crate::suno_client::{GenerationRequest, MusicBackend};
use crate::types::{BackendError, Clip, GenerationPrompt, EFFECTIVE_BACKEND_PROMPT_CHARS};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Prompt is required")]
    EmptyPrompt,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(
        "Generation timed out after {}s with {} clip(s) unfinished",
        .waited.as_secs(),
        unfinished(.last_snapshot)
    )]
    Timeout {
        waited: Duration,
        last_snapshot: Vec<Clip>,
    },

    #[error("Generation observation cancelled")]
    Cancelled { last_snapshot: Vec<Clip> },
}

fn unfinished(clips: &[Clip]) -> usize {
    clips.iter().filter(|c| !c.status.is_terminal()).count()
}

impl GenerationError {
    /// Best-known clip state at the time of failure (may be empty)
    pub fn partial_snapshot(&self) -> &[Clip] {
        match self {
            GenerationError::Timeout { last_snapshot, .. }
            | GenerationError::Cancelled { last_snapshot } => last_snapshot,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(600),
        }
    }
}

/// Ephemeral state of one generation request
#[derive(Debug)]
struct PollSession {
    clip_ids: Vec<String>,
    attempt: u32,
    started: Instant,
    deadline: Instant,
    last_snapshot: Vec<Clip>,
}

impl PollSession {
    fn new(initial: Vec<Clip>, max_wait: Duration) -> Self {
        let started = Instant::now();
        Self {
            clip_ids: initial.iter().map(|c| c.id.clone()).collect(),
            attempt: 0,
            started,
            deadline: started + max_wait,
            last_snapshot: initial,
        }
    }

    /// Replace tracked clips with fetched versions; unknown ids are ignored
    fn merge(&mut self, fetched: Vec<Clip>) {
        for clip in fetched {
            if let Some(slot) = self.last_snapshot.iter_mut().find(|c| c.id == clip.id) {
                *slot = clip;
            }
        }
    }

    fn all_terminal(&self) -> bool {
        self.last_snapshot.iter().all(|c| c.status.is_terminal())
    }

    fn any_playable(&self) -> bool {
        self.last_snapshot.iter().any(|c| c.status.is_playable())
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

pub struct GenerationOrchestrator {
    backend: Arc<dyn MusicBackend>,
    config: PollConfig,
}

impl GenerationOrchestrator {
    pub fn new(backend: Arc<dyn MusicBackend>, config: PollConfig) -> Self {
        Self { backend, config }
    }

    /// Submit only; returns the initial clip descriptor
    pub async fn submit(
        &self,
        prompt: &GenerationPrompt,
        make_instrumental: bool,
    ) -> Result<Clip, GenerationError> {
        if prompt.prompt().trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let chars = prompt.prompt().chars().count();
        if chars > EFFECTIVE_BACKEND_PROMPT_CHARS {
            tracing::warn!(
                chars,
                limit = EFFECTIVE_BACKEND_PROMPT_CHARS,
                "Prompt longer than the backend reliably accepts"
            );
        }

        let request = GenerationRequest {
            topic: prompt.prompt().to_string(),
            tags: Some(prompt.tags().to_string()).filter(|t| !t.is_empty()),
            make_instrumental,
        };

        Ok(self.backend.create(&request).await?)
    }

    /// Submit and drive to completion
    pub async fn generate<F>(
        &self,
        prompt: &GenerationPrompt,
        make_instrumental: bool,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<Vec<Clip>, GenerationError>
    where
        F: FnMut(&[Clip]) + Send,
    {
        let clip = self.submit(prompt, make_instrumental).await?;
        self.poll_until_complete(vec![clip], on_progress, cancel).await
    }

    /// Poll tracked clips until all are terminal
    ///
    /// `on_progress` may be called zero or many times; each call carries a
    /// full snapshot superseding the previous one.
    pub async fn poll_until_complete<F>(
        &self,
        initial: Vec<Clip>,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<Vec<Clip>, GenerationError>
    where
        F: FnMut(&[Clip]) + Send,
    {
        let mut session = PollSession::new(initial, self.config.max_wait);

        if session.any_playable() {
            on_progress(&session.last_snapshot);
        }
        if session.all_terminal() {
            return Ok(session.last_snapshot);
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(attempt = session.attempt, "Polling cancelled by caller");
                    return Err(GenerationError::Cancelled {
                        last_snapshot: session.last_snapshot,
                    });
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            session.attempt += 1;

            match self.backend.fetch_clips(&session.clip_ids).await {
                Ok(fetched) => session.merge(fetched),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        attempt = session.attempt,
                        error = %e,
                        "Clip status fetch failed, will poll again"
                    );
                }
                Err(e) => {
                    tracing::error!(attempt = session.attempt, error = %e, "Clip status fetch rejected");
                    return Err(e.into());
                }
            }

            tracing::debug!(
                attempt = session.attempt,
                statuses = ?session.last_snapshot.iter().map(|c| c.status).collect::<Vec<_>>(),
                "Polled clip status"
            );

            if session.any_playable() {
                on_progress(&session.last_snapshot);
            }

            if session.all_terminal() {
                tracing::info!(
                    attempt = session.attempt,
                    elapsed_ms = session.started.elapsed().as_millis() as u64,
                    with_audio = session
                        .last_snapshot
                        .iter()
                        .filter(|c| c.has_playable_audio())
                        .count(),
                    "All clips reached a terminal state"
                );
                return Ok(session.last_snapshot);
            }

            if session.expired() {
                let waited = session.started.elapsed();
                tracing::error!(
                    attempt = session.attempt,
                    elapsed_ms = waited.as_millis() as u64,
                    "Generation exceeded maximum wait"
                );
                return Err(GenerationError::Timeout {
                    waited,
                    last_snapshot: session.last_snapshot,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClipMetadata, ClipStatus};

    fn clip(id: &str, status: ClipStatus) -> Clip {
        Clip {
            id: id.to_string(),
            status,
            audio_url: None,
            title: None,
            metadata: ClipMetadata::default(),
            created_at: None,
        }
    }

    #[test]
    fn test_merge_replaces_by_id_and_ignores_unknown() {
        let mut session = PollSession::new(
            vec![clip("a", ClipStatus::Queued), clip("b", ClipStatus::Queued)],
            Duration::from_secs(60),
        );
        session.merge(vec![clip("b", ClipStatus::Complete), clip("zzz", ClipStatus::Complete)]);

        assert_eq!(session.last_snapshot.len(), 2);
        assert_eq!(session.last_snapshot[0].status, ClipStatus::Queued);
        assert_eq!(session.last_snapshot[1].status, ClipStatus::Complete);
        assert!(!session.all_terminal());
        assert!(session.any_playable());
    }

    #[test]
    fn test_partial_snapshot() {
        let err = GenerationError::Timeout {
            waited: Duration::from_secs(600),
            last_snapshot: vec![clip("a", ClipStatus::Streaming)],
        };
        assert_eq!(err.partial_snapshot().len(), 1);
        assert!(err.to_string().contains("1 clip(s) unfinished"));
        assert!(GenerationError::EmptyPrompt.partial_snapshot().is_empty());
    }
}
