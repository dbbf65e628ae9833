//! Prompt synthesizer tests against an in-process text backend

mod helpers;

use helpers::StaticTextGenerator;
use lifesong_gen::synthesizer::{PromptSynthesizer, SynthesisError, FALLBACK_PROMPT, FALLBACK_TAGS};
use lifesong_gen::types::{
    ArtistSummary, BackendError, CollectorSummary, EmailSummary, MusicTaste, TrackSummary,
    MAX_PROMPT_CHARS,
};

fn music_only_summary() -> CollectorSummary {
    CollectorSummary {
        music_taste: Some(MusicTaste {
            top_artists: vec![ArtistSummary {
                name: "A".to_string(),
                genres: vec!["indie".to_string()],
            }],
            top_tracks: vec![TrackSummary {
                name: "T".to_string(),
                artist: "A".to_string(),
            }],
        }),
        recent_emails: None,
        message_activity: None,
    }
}

#[tokio::test]
async fn test_music_taste_only_scenario() {
    let backend = StaticTextGenerator::replying(
        r#"{"prompt":"Quiet mornings, loud inboxes, and a bike ride home","tags":"indie, mellow"}"#,
    );
    let synthesizer = PromptSynthesizer::new(backend.clone(), "test-model", 1024);

    let prompt = synthesizer
        .synthesize(&music_only_summary(), false)
        .await
        .unwrap();

    assert_eq!(backend.calls(), 1);
    assert_eq!(prompt.prompt(), "Quiet mornings, loud inboxes, and a bike ride home");
    assert_eq!(prompt.tags(), "indie, mellow");

    let request = backend.last_request().unwrap();
    assert_eq!(request.model, "test-model");
    assert_eq!(request.max_output_tokens, 1024);
    assert!(request.prompt.contains("\"musicTaste\""));
    assert!(!request.prompt.contains("\"recentEmails\""), "Absent sources are omitted");
    assert!(!request.prompt.contains("\"messageActivity\""));
}

#[tokio::test]
async fn test_no_sources_fails_without_backend_call() {
    let backend = StaticTextGenerator::replying("{}");
    let synthesizer = PromptSynthesizer::new(backend.clone(), "test-model", 1024);

    let err = synthesizer
        .synthesize(&CollectorSummary::default(), true)
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::NoSources));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_conversation_only_requires_opt_in() {
    let backend = StaticTextGenerator::replying(r#"{"prompt":"p","tags":"t"}"#);
    let synthesizer = PromptSynthesizer::new(backend.clone(), "test-model", 1024);
    let summary = CollectorSummary {
        message_activity: Some("Recent message activity:\n\nContact_1: 2 messages\n".to_string()),
        ..Default::default()
    };

    assert!(matches!(
        synthesizer.synthesize(&summary, false).await,
        Err(SynthesisError::NoSources)
    ));
    assert!(synthesizer.synthesize(&summary, true).await.is_ok());
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_malformed_reply_uses_fallbacks() {
    let backend = StaticTextGenerator::replying("Here is a lovely song idea for you!");
    let synthesizer = PromptSynthesizer::new(backend, "test-model", 1024);

    let prompt = synthesizer
        .synthesize(&music_only_summary(), false)
        .await
        .unwrap();

    assert_eq!(prompt.prompt(), FALLBACK_PROMPT);
    assert_eq!(prompt.tags(), FALLBACK_TAGS);
}

#[tokio::test]
async fn test_overlong_prompt_is_truncated() {
    let reply = serde_json::json!({
        "prompt": "la ".repeat(400),
        "tags": "pop"
    })
    .to_string();
    let backend = StaticTextGenerator::replying(&reply);
    let synthesizer = PromptSynthesizer::new(backend, "test-model", 1024);

    let summary = CollectorSummary {
        recent_emails: Some(vec![EmailSummary {
            subject: "Quarterly review".to_string(),
            from: "boss@work.example".to_string(),
        }]),
        ..Default::default()
    };
    let prompt = synthesizer.synthesize(&summary, false).await.unwrap();

    assert!(prompt.prompt().chars().count() <= MAX_PROMPT_CHARS);
    assert_eq!(prompt.tags(), "pop");
}

#[tokio::test]
async fn test_backend_failure_is_not_retried() {
    let backend = StaticTextGenerator::failing(BackendError::Server {
        service: "Anthropic",
        status: 529,
        body: "overloaded".to_string(),
    });
    let synthesizer = PromptSynthesizer::new(backend.clone(), "test-model", 1024);

    let err = synthesizer
        .synthesize(&music_only_summary(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::Backend(_)));
    assert_eq!(backend.calls(), 1);
}
