//! Pipeline runner: collectors → synthesizer → orchestrator
//!
//! Each run owns its `PipelineContext`. Events go through the session
//! registry so late SSE subscribers can replay them.

use crate::collectors::{gather, Collector};
use crate::orchestrator::{GenerationError, GenerationOrchestrator};
use crate::sessions::SessionRegistry;
use crate::synthesizer::{PromptSynthesizer, SynthesisError};
use crate::types::Clip;
use chrono::Utc;
use lifesong_common::events::{EventBus, LifesongEvent};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Body of `POST /pipeline/start`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    #[serde(default)]
    pub spotify_token: Option<String>,
    #[serde(default)]
    pub gmail_token: Option<String>,
    #[serde(default)]
    pub include_messages: bool,
    #[serde(default)]
    pub make_instrumental: bool,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    fn partial_clips(&self) -> Vec<Clip> {
        match self {
            PipelineError::Generation(e) => e.partial_snapshot().to_vec(),
            _ => Vec::new(),
        }
    }

    fn is_cancellation(&self) -> bool {
        matches!(
            self,
            PipelineError::Cancelled | PipelineError::Generation(GenerationError::Cancelled { .. })
        )
    }
}

/// Request-scoped state for one run
#[derive(Clone)]
pub struct PipelineContext {
    pub session_id: Uuid,
    pub event_bus: EventBus,
    pub cancel: CancellationToken,
    pub sessions: SessionRegistry,
}

impl PipelineContext {
    /// Register a fresh session and build its context
    pub fn register(sessions: &SessionRegistry, event_bus: EventBus) -> Self {
        let session_id = Uuid::new_v4();
        let cancel = sessions.register(session_id);
        Self {
            session_id,
            event_bus,
            cancel,
            sessions: sessions.clone(),
        }
    }

    /// Record the event in the session history and broadcast it
    pub fn emit(&self, event: LifesongEvent) {
        self.sessions.publish(&self.event_bus, event);
    }
}

pub struct Pipeline {
    collectors: Vec<Box<dyn Collector>>,
    synthesizer: PromptSynthesizer,
    orchestrator: GenerationOrchestrator,
    include_messages: bool,
    make_instrumental: bool,
}

impl Pipeline {
    pub fn new(
        collectors: Vec<Box<dyn Collector>>,
        synthesizer: PromptSynthesizer,
        orchestrator: GenerationOrchestrator,
    ) -> Self {
        Self {
            collectors,
            synthesizer,
            orchestrator,
            include_messages: false,
            make_instrumental: false,
        }
    }

    pub fn include_messages(mut self, include: bool) -> Self {
        self.include_messages = include;
        self
    }

    pub fn make_instrumental(mut self, instrumental: bool) -> Self {
        self.make_instrumental = instrumental;
        self
    }

    /// Run to completion, emitting progress and exactly one final event
    pub async fn run(self, ctx: &PipelineContext) -> Result<Vec<Clip>, PipelineError> {
        let result = self.execute(ctx).await;

        let final_event = match &result {
            Ok(clips) => {
                tracing::info!(session_id = %ctx.session_id, clips = clips.len(), "Pipeline completed");
                LifesongEvent::PipelineCompleted {
                    session_id: ctx.session_id,
                    clips: clips.clone(),
                    timestamp: Utc::now(),
                }
            }
            Err(e) if e.is_cancellation() => {
                tracing::info!(session_id = %ctx.session_id, "Pipeline cancelled");
                LifesongEvent::PipelineCancelled {
                    session_id: ctx.session_id,
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                tracing::error!(session_id = %ctx.session_id, error = %e, "Pipeline failed");
                LifesongEvent::PipelineFailed {
                    session_id: ctx.session_id,
                    error: e.to_string(),
                    partial_clips: e.partial_clips(),
                    timestamp: Utc::now(),
                }
            }
        };
        ctx.emit(final_event);

        result
    }

    async fn execute(&self, ctx: &PipelineContext) -> Result<Vec<Clip>, PipelineError> {
        let session_id = ctx.session_id;

        ctx.emit(LifesongEvent::PipelineStarted {
            session_id,
            sources: self
                .collectors
                .iter()
                .map(|c| c.source().to_string())
                .collect(),
            timestamp: Utc::now(),
        });

        let (summary, reports) = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(PipelineError::Cancelled),
            gathered = gather(&self.collectors) => gathered,
        };

        for report in reports {
            ctx.emit(LifesongEvent::CollectorFinished {
                session_id,
                source: report.source.to_string(),
                ok: report.ok,
                item_count: report.item_count,
                detail: report.detail,
                timestamp: Utc::now(),
            });
        }

        let prompt = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(PipelineError::Cancelled),
            synthesized = self.synthesizer.synthesize(&summary, self.include_messages) => synthesized?,
        };

        ctx.emit(LifesongEvent::PromptSynthesized {
            session_id,
            prompt: prompt.prompt().to_string(),
            tags: prompt.tags().to_string(),
            timestamp: Utc::now(),
        });

        let clip = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(PipelineError::Cancelled),
            submitted = self.orchestrator.submit(&prompt, self.make_instrumental) => submitted?,
        };

        ctx.emit(LifesongEvent::GenerationSubmitted {
            session_id,
            clip_ids: vec![clip.id.clone()],
            timestamp: Utc::now(),
        });

        let on_progress = |clips: &[Clip]| {
            ctx.emit(LifesongEvent::ClipsUpdated {
                session_id,
                clips: clips.to_vec(),
                timestamp: Utc::now(),
            });
        };

        let clips = self
            .orchestrator
            .poll_until_complete(vec![clip], on_progress, &ctx.cancel)
            .await?;

        Ok(clips)
    }
}
