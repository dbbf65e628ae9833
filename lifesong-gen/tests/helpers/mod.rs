//! Shared test doubles for lifesong-gen integration tests
//!
//! In-process fakes for the text and music backends so orchestration and
//! pipeline tests can run under paused tokio time without a network.

#![allow(dead_code)]

use lifesong_common::events::EventBus;
use lifesong_gen::collectors::{Collector, CollectorError, SummaryFragment};
use lifesong_gen::config::GenConfig;
use lifesong_gen::llm_client::{TextGenerator, TextRequest};
use lifesong_gen::suno_client::{GenerationRequest, MusicBackend};
use lifesong_gen::types::{BackendError, Clip, ClipMetadata, ClipStatus, SourceKind};
use lifesong_gen::AppState;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn clip(id: &str, status: ClipStatus) -> Clip {
    let audio_url = if status.is_playable() {
        Some(format!("https://cdn.example/{}.mp3", id))
    } else {
        None
    };
    Clip {
        id: id.to_string(),
        status,
        audio_url,
        title: Some("Untitled".to_string()),
        metadata: ClipMetadata {
            duration: (status == ClipStatus::Complete).then_some(123.4),
            tags: Some("indie, mellow".to_string()),
        },
        created_at: None,
    }
}

// ============================================================================
// Text backend
// ============================================================================

/// Returns a fixed reply and records every request
pub struct StaticTextGenerator {
    reply: Result<String, BackendError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<TextRequest>>,
}

impl StaticTextGenerator {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn failing(error: BackendError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<TextRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TextGenerator for StaticTextGenerator {
    async fn generate(&self, request: &TextRequest) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.reply.clone()
    }
}

// ============================================================================
// Music backend
// ============================================================================

/// Replays a script of poll responses; the last entry repeats forever
pub struct ScriptedMusicBackend {
    created: Result<Clip, BackendError>,
    polls: Mutex<VecDeque<Result<Vec<Clip>, BackendError>>>,
    last_poll: Mutex<Option<Result<Vec<Clip>, BackendError>>>,
    create_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedMusicBackend {
    pub fn new(created: Clip, polls: Vec<Result<Vec<Clip>, BackendError>>) -> Arc<Self> {
        Self::with_create_result(Ok(created), polls)
    }

    pub fn with_create_result(
        created: Result<Clip, BackendError>,
        polls: Vec<Result<Vec<Clip>, BackendError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            created,
            polls: Mutex::new(polls.into()),
            last_poll: Mutex::new(None),
            create_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MusicBackend for ScriptedMusicBackend {
    async fn create(&self, request: &GenerationRequest) -> Result<Clip, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.created.clone()
    }

    async fn fetch_clips(&self, _ids: &[String]) -> Result<Vec<Clip>, BackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.polls.lock().unwrap().pop_front();
        let mut last = self.last_poll.lock().unwrap();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last.clone().unwrap_or_else(|| Ok(Vec::new())),
        }
    }
}

pub fn server_error() -> BackendError {
    BackendError::Server {
        service: "Suno",
        status: 503,
        body: "upstream busy".to_string(),
    }
}

pub fn client_error(status: u16) -> BackendError {
    BackendError::Client {
        service: "Suno",
        status,
        body: "bad request".to_string(),
    }
}

// ============================================================================
// Collectors
// ============================================================================

pub struct FakeCollector {
    pub source: SourceKind,
    pub result: Result<SummaryFragment, String>,
}

impl FakeCollector {
    pub fn ok(source: SourceKind, fragment: SummaryFragment) -> Box<dyn Collector> {
        Box::new(Self {
            source,
            result: Ok(fragment),
        })
    }

    pub fn failing(source: SourceKind, error: &str) -> Box<dyn Collector> {
        Box::new(Self {
            source,
            result: Err(error.to_string()),
        })
    }
}

#[async_trait::async_trait]
impl Collector for FakeCollector {
    fn source(&self) -> SourceKind {
        self.source
    }

    async fn collect(&self) -> Result<SummaryFragment, CollectorError> {
        self.result.clone().map_err(CollectorError::Unavailable)
    }
}

// ============================================================================
// App state
// ============================================================================

/// State with no backends wired, regardless of the process environment
pub fn test_app_state(message_db: &Path) -> AppState {
    let mut config = GenConfig::default();
    config.messages.db_path = Some(message_db.to_path_buf());

    let mut state = AppState::new(config, EventBus::new(100)).unwrap();
    state.text_backend = None;
    state.music_backend = None;
    state.transcriber = None;
    state
}
