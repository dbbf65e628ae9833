//! Reply parsing with deterministic fallback
//!
//! Order per field: structured JSON value → regex extraction from raw text →
//! literal default. Never fails.

use crate::types::GenerationPrompt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

pub const FALLBACK_PROMPT: &str = "A personalized song inspired by your life";
pub const FALLBACK_TAGS: &str = "personal, inspiring, unique";

static PROMPT_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""prompt":\s*"([^"]+)""#).expect("valid regex"));
static TAGS_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""tags":\s*"([^"]+)""#).expect("valid regex"));

#[derive(Debug, Default, Deserialize)]
struct Reply {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    tags: String,
}

/// How the prompt was obtained, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Structured,
    Recovered,
    Defaulted,
}

pub fn parse_reply(raw: &str) -> (GenerationPrompt, ParseOutcome) {
    let structured = serde_json::from_str::<Reply>(raw.trim()).ok();

    if let Some(reply) = &structured {
        if !reply.prompt.trim().is_empty() && !reply.tags.trim().is_empty() {
            return (
                GenerationPrompt::new(&reply.prompt, &reply.tags),
                ParseOutcome::Structured,
            );
        }
    }

    tracing::warn!(
        parsed = structured.is_some(),
        "Text backend reply not usable as-is, applying fallback extraction"
    );

    let reply = structured.unwrap_or_default();
    let prompt = non_empty(reply.prompt).or_else(|| capture(&PROMPT_FIELD, raw));
    let tags = non_empty(reply.tags).or_else(|| capture(&TAGS_FIELD, raw));

    let outcome = if prompt.is_some() || tags.is_some() {
        ParseOutcome::Recovered
    } else {
        ParseOutcome::Defaulted
    };

    (
        GenerationPrompt::new(
            prompt.as_deref().unwrap_or(FALLBACK_PROMPT),
            tags.as_deref().unwrap_or(FALLBACK_TAGS),
        ),
        outcome,
    )
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn capture(pattern: &Regex, raw: &str) -> Option<String> {
    pattern
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .and_then(non_empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_reply() {
        let (prompt, outcome) =
            parse_reply(r#"{"prompt": "A song about inbox zero", "tags": "indie, mellow"}"#);
        assert_eq!(outcome, ParseOutcome::Structured);
        assert_eq!(prompt.prompt(), "A song about inbox zero");
        assert_eq!(prompt.tags(), "indie, mellow");
    }

    #[test]
    fn test_json_wrapped_in_prose_is_recovered() {
        let raw = r#"Sure! Here it is:
{
  "prompt": "Late trains and early coffee",
  "tags": "folk, warm"
}
Hope you like it."#;
        let (prompt, outcome) = parse_reply(raw);
        assert_eq!(outcome, ParseOutcome::Recovered);
        assert_eq!(prompt.prompt(), "Late trains and early coffee");
        assert_eq!(prompt.tags(), "folk, warm");
    }

    #[test]
    fn test_fallback_applies_per_field() {
        let (prompt, outcome) = parse_reply(r#"{"prompt": "Only a prompt here", "tags": ""}"#);
        assert_eq!(outcome, ParseOutcome::Recovered);
        assert_eq!(prompt.prompt(), "Only a prompt here");
        assert_eq!(prompt.tags(), FALLBACK_TAGS);
    }

    #[test]
    fn test_garbage_yields_literal_defaults() {
        let (prompt, outcome) = parse_reply("I cannot help with that.");
        assert_eq!(outcome, ParseOutcome::Defaulted);
        assert_eq!(prompt.prompt(), FALLBACK_PROMPT);
        assert_eq!(prompt.tags(), FALLBACK_TAGS);
    }

    #[test]
    fn test_empty_reply_yields_literal_defaults() {
        let (prompt, _) = parse_reply("");
        assert!(!prompt.prompt().is_empty());
        assert!(!prompt.tags().is_empty());
    }
}
