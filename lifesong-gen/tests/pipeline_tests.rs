//! Pipeline runner tests: event sequence and failure reporting

mod helpers;

use helpers::{clip, FakeCollector, ScriptedMusicBackend, StaticTextGenerator};
use lifesong_common::events::{EventBus, LifesongEvent};
use lifesong_gen::collectors::SummaryFragment;
use lifesong_gen::orchestrator::{GenerationOrchestrator, PollConfig};
use lifesong_gen::pipeline::{Pipeline, PipelineContext, PipelineError};
use lifesong_gen::synthesizer::PromptSynthesizer;
use lifesong_gen::types::{
    ArtistSummary, ClipStatus, Correspondence, EmailSummary, MusicTaste, SourceKind,
};
use std::time::Duration;
use lifesong_gen::sessions::{SessionRegistry, SessionState};
use tokio::sync::broadcast;

const REPLY: &str = r#"{"prompt":"Boarding passes and birthday plans","tags":"indie, upbeat"}"#;

fn poll_config() -> PollConfig {
    PollConfig {
        interval: Duration::from_secs(5),
        max_wait: Duration::from_secs(60),
    }
}

fn context() -> PipelineContext {
    PipelineContext::register(&SessionRegistry::new(), EventBus::new(100))
}

fn drain(rx: &mut broadcast::Receiver<LifesongEvent>) -> Vec<LifesongEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn taste_fragment() -> SummaryFragment {
    SummaryFragment::MusicTaste(MusicTaste {
        top_artists: vec![ArtistSummary {
            name: "A".to_string(),
            genres: vec!["indie".to_string()],
        }],
        top_tracks: vec![],
    })
}

#[tokio::test(start_paused = true)]
async fn test_successful_run_emits_ordered_events() {
    let text = StaticTextGenerator::replying(REPLY);
    let music = ScriptedMusicBackend::new(
        clip("c-1", ClipStatus::Queued),
        vec![
            Ok(vec![clip("c-1", ClipStatus::Streaming)]),
            Ok(vec![clip("c-1", ClipStatus::Complete)]),
        ],
    );

    let pipeline = Pipeline::new(
        vec![
            FakeCollector::ok(SourceKind::MusicTaste, taste_fragment()),
            FakeCollector::ok(
                SourceKind::RecentEmails,
                SummaryFragment::Correspondence(Correspondence::new(vec![EmailSummary {
                    subject: "Your flight to Lisbon".to_string(),
                    from: "airline@example.com".to_string(),
                }])),
            ),
        ],
        PromptSynthesizer::new(text.clone(), "test-model", 1024),
        GenerationOrchestrator::new(music.clone(), poll_config()),
    );

    let ctx = context();
    let mut rx = ctx.event_bus.subscribe();

    let clips = pipeline.run(&ctx).await.unwrap();
    assert_eq!(clips[0].status, ClipStatus::Complete);
    assert_eq!(text.calls(), 1);
    assert_eq!(music.create_calls(), 1);

    let events = drain(&mut rx);
    let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(
        types,
        vec![
            "PipelineStarted",
            "CollectorFinished",
            "CollectorFinished",
            "PromptSynthesized",
            "GenerationSubmitted",
            "ClipsUpdated",
            "ClipsUpdated",
            "PipelineCompleted",
        ]
    );
    assert!(events.iter().all(|e| e.session_id() == ctx.session_id));

    match &events[3] {
        LifesongEvent::PromptSynthesized { prompt, tags, .. } => {
            assert_eq!(prompt, "Boarding passes and birthday plans");
            assert_eq!(tags, "indie, upbeat");
        }
        other => panic!("Unexpected event {:?}", other),
    }
    match &events[5] {
        LifesongEvent::ClipsUpdated { clips, .. } => {
            assert_eq!(clips[0].status, ClipStatus::Streaming);
        }
        other => panic!("Unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_degraded_source_is_reported_and_dropped() {
    let text = StaticTextGenerator::replying(REPLY);
    let music = ScriptedMusicBackend::new(clip("c-1", ClipStatus::Complete), vec![]);

    let pipeline = Pipeline::new(
        vec![
            FakeCollector::ok(SourceKind::MusicTaste, taste_fragment()),
            FakeCollector::failing(SourceKind::RecentEmails, "token expired"),
        ],
        PromptSynthesizer::new(text.clone(), "test-model", 1024),
        GenerationOrchestrator::new(music, poll_config()),
    );

    let ctx = context();
    let mut rx = ctx.event_bus.subscribe();
    pipeline.run(&ctx).await.unwrap();

    let failed_source = drain(&mut rx).into_iter().find_map(|event| match event {
        LifesongEvent::CollectorFinished {
            source, ok: false, detail, ..
        } => Some((source, detail)),
        _ => None,
    });
    assert_eq!(
        failed_source,
        Some(("recentEmails".to_string(), Some("token expired".to_string())))
    );

    let request = text.last_request().unwrap();
    assert!(!request.prompt.contains("\"recentEmails\""));
}

#[tokio::test]
async fn test_all_sources_failing_is_fatal() {
    let text = StaticTextGenerator::replying(REPLY);
    let music = ScriptedMusicBackend::new(clip("c-1", ClipStatus::Queued), vec![]);

    let pipeline = Pipeline::new(
        vec![FakeCollector::failing(SourceKind::MusicTaste, "401 Unauthorized")],
        PromptSynthesizer::new(text.clone(), "test-model", 1024),
        GenerationOrchestrator::new(music.clone(), poll_config()),
    );

    let ctx = context();
    let mut rx = ctx.event_bus.subscribe();
    let err = pipeline.run(&ctx).await.unwrap_err();

    assert!(matches!(err, PipelineError::Synthesis(_)));
    assert_eq!(text.calls(), 0);
    assert_eq!(music.create_calls(), 0);

    let last = drain(&mut rx).pop().unwrap();
    assert_eq!(last.event_type(), "PipelineFailed");
    assert!(last.is_final());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_reports_partial_clips() {
    let text = StaticTextGenerator::replying(REPLY);
    let music = ScriptedMusicBackend::new(
        clip("c-1", ClipStatus::Queued),
        vec![Ok(vec![clip("c-1", ClipStatus::Streaming)])],
    );

    let pipeline = Pipeline::new(
        vec![FakeCollector::ok(SourceKind::MusicTaste, taste_fragment())],
        PromptSynthesizer::new(text, "test-model", 1024),
        GenerationOrchestrator::new(music, poll_config()),
    );

    let ctx = context();
    let mut rx = ctx.event_bus.subscribe();
    pipeline.run(&ctx).await.unwrap_err();

    match drain(&mut rx).pop().unwrap() {
        LifesongEvent::PipelineFailed { partial_clips, .. } => {
            assert_eq!(partial_clips.len(), 1);
            assert_eq!(partial_clips[0].status, ClipStatus::Streaming);
        }
        other => panic!("Unexpected final event {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_before_start_emits_cancelled() {
    let text = StaticTextGenerator::replying(REPLY);
    let music = ScriptedMusicBackend::new(clip("c-1", ClipStatus::Queued), vec![]);

    let pipeline = Pipeline::new(
        vec![FakeCollector::ok(SourceKind::MusicTaste, taste_fragment())],
        PromptSynthesizer::new(text, "test-model", 1024),
        GenerationOrchestrator::new(music.clone(), poll_config()),
    );

    let ctx = context();
    ctx.cancel.cancel();
    let mut rx = ctx.event_bus.subscribe();

    let err = pipeline.run(&ctx).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(music.create_calls(), 0);

    let last = drain(&mut rx).pop().unwrap();
    assert_eq!(last.event_type(), "PipelineCancelled");
}

#[tokio::test]
async fn test_session_history_replays_after_run() {
    let text = StaticTextGenerator::replying(REPLY);
    let music = ScriptedMusicBackend::new(clip("c-1", ClipStatus::Queued), vec![]);

    let pipeline = Pipeline::new(
        vec![FakeCollector::failing(SourceKind::MusicTaste, "401 Unauthorized")],
        PromptSynthesizer::new(text, "test-model", 1024),
        GenerationOrchestrator::new(music, poll_config()),
    );

    let ctx = context();
    pipeline.run(&ctx).await.unwrap_err();
    assert_eq!(ctx.sessions.finish(ctx.session_id), Some(SessionState::Failed));

    let (history, mut rx) = ctx
        .sessions
        .subscribe(ctx.session_id, &ctx.event_bus)
        .unwrap();
    let types: Vec<&str> = history.iter().map(|e| e.event_type()).collect();
    assert_eq!(
        types,
        vec!["PipelineStarted", "CollectorFinished", "PipelineFailed"]
    );
    assert!(drain(&mut rx).is_empty());
}
