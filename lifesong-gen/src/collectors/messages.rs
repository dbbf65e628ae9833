//! Conversation collector: local message store
//!
//! Reads the macOS Messages SQLite database read-only. Failure to open or
//! query the store is never an error for the caller: `extract` returns an
//! empty extract carrying a diagnostic instead.
//!
//! Contacts are anonymized as `Contact_1..n` in first-seen order before
//! anything leaves this module.

use super::{Collector, CollectorError, SummaryFragment};
use crate::types::{truncate_chars, SourceKind};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Row};
use std::collections::HashMap;
use std::path::PathBuf;

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z
const APPLE_EPOCH_OFFSET_SECS: i64 = 978_307_200;
const NANOS_PER_SEC: i64 = 1_000_000_000;

const SAMPLES_PER_CONTACT: usize = 3;
const SAMPLE_CHARS: usize = 50;
pub const MAX_ACTIVITY_CHARS: usize = 1500;

const RECENT_MESSAGES_QUERY: &str = r#"
SELECT text, date, is_from_me, contact FROM (
    SELECT
        message.text AS text,
        message.date AS date,
        message.is_from_me AS is_from_me,
        handle.id AS contact
    FROM message
    LEFT JOIN handle ON message.handle_id = handle.ROWID
    WHERE message.date > ?
      AND message.text IS NOT NULL
      AND message.text != ''
    ORDER BY message.date DESC
    LIMIT ?
)
ORDER BY date ASC
"#;

/// Message row with the contact already anonymized
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizedMessage {
    pub text: String,
    pub date: DateTime<Utc>,
    pub from_user: bool,
    pub contact: String,
}

/// Collector output surfaced at `/imessage/data`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationExtract {
    pub messages: Vec<AnonymizedMessage>,
    pub count: usize,
    /// `"Contact_k: n messages"` per contact, first-seen order
    pub preview: Vec<String>,
    pub summary: String,
    pub contact_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversationExtract {
    fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            summary: format!("Error accessing messages: {}", error),
            error: Some(error),
            ..Default::default()
        }
    }

    fn from_messages(messages: Vec<AnonymizedMessage>) -> Self {
        if messages.is_empty() {
            return Self {
                summary: "No recent messages found".to_string(),
                ..Default::default()
            };
        }

        let groups = group_by_contact(&messages);
        let preview = groups
            .iter()
            .map(|(contact, msgs)| format!("{}: {} messages", contact, msgs.len()))
            .collect();
        let contact_count = groups.len();
        let count = messages.len();

        Self {
            summary: format!(
                "Processed {} messages from {} contacts",
                count, contact_count
            ),
            messages,
            count,
            preview,
            contact_count,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Prompt-facing text; empty when there are no messages
    pub fn activity_text(&self) -> String {
        activity_text(&self.messages)
    }
}

pub struct MessageStoreCollector {
    db_path: Option<PathBuf>,
    days_back: u32,
    max_messages: u32,
}

impl MessageStoreCollector {
    pub fn new(db_path: Option<PathBuf>, days_back: u32, max_messages: u32) -> Self {
        Self {
            db_path,
            days_back,
            max_messages,
        }
    }

    /// Read, anonymize and summarize; never fails
    pub async fn extract(&self) -> ConversationExtract {
        match self.read_recent().await {
            Ok(raw) => {
                tracing::info!(
                    count = raw.len(),
                    days_back = self.days_back,
                    "Read messages from local store"
                );
                ConversationExtract::from_messages(anonymize(raw))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Message store unavailable");
                ConversationExtract::failed(e)
            }
        }
    }

    async fn read_recent(&self) -> Result<Vec<RawMessage>, String> {
        let path = self
            .db_path
            .as_ref()
            .ok_or_else(|| "message store location unknown (no home directory)".to_string())?;

        if !path.exists() {
            return Err(format!("message store not found at {}", path.display()));
        }

        let mut conn = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false)
            .connect()
            .await
            .map_err(|e| format!("cannot open message store (grant Full Disk Access?): {}", e))?;

        let cutoff = apple_timestamp(Utc::now() - Duration::days(i64::from(self.days_back)));

        let rows = sqlx::query(RECENT_MESSAGES_QUERY)
            .bind(cutoff)
            .bind(i64::from(self.max_messages))
            .fetch_all(&mut conn)
            .await
            .map_err(|e| format!("message store query failed: {}", e))?;

        rows.iter()
            .map(|row| {
                Ok(RawMessage {
                    text: row.try_get("text")?,
                    date: from_apple_timestamp(row.try_get("date")?),
                    is_from_me: row.try_get::<i64, _>("is_from_me")? != 0,
                    contact: row
                        .try_get::<Option<String>, _>("contact")?
                        .unwrap_or_else(|| "Unknown".to_string()),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| format!("unexpected message row: {}", e))
    }
}

#[async_trait::async_trait]
impl Collector for MessageStoreCollector {
    fn source(&self) -> SourceKind {
        SourceKind::MessageActivity
    }

    async fn collect(&self) -> Result<SummaryFragment, CollectorError> {
        let extract = self.extract().await;
        if let Some(error) = extract.error {
            return Err(CollectorError::Unavailable(error));
        }
        if extract.count == 0 {
            return Err(CollectorError::NoData(extract.summary));
        }

        Ok(SummaryFragment::MessageActivity {
            text: activity_text(&extract.messages),
            message_count: extract.count,
        })
    }
}

/// Row as stored, before anonymization
#[derive(Debug, Clone)]
pub(crate) struct RawMessage {
    pub text: String,
    pub date: DateTime<Utc>,
    pub is_from_me: bool,
    pub contact: String,
}

pub(crate) fn anonymize(raw: Vec<RawMessage>) -> Vec<AnonymizedMessage> {
    let mut aliases: HashMap<String, String> = HashMap::new();
    raw.into_iter()
        .map(|msg| {
            let next = aliases.len() + 1;
            let alias = aliases
                .entry(msg.contact)
                .or_insert_with(|| format!("Contact_{}", next))
                .clone();
            AnonymizedMessage {
                text: msg.text,
                date: msg.date,
                from_user: msg.is_from_me,
                contact: alias,
            }
        })
        .collect()
}

fn group_by_contact(messages: &[AnonymizedMessage]) -> Vec<(&str, Vec<&AnonymizedMessage>)> {
    let mut groups: Vec<(&str, Vec<&AnonymizedMessage>)> = Vec::new();
    for msg in messages {
        match groups.iter_mut().find(|(contact, _)| *contact == msg.contact) {
            Some((_, msgs)) => msgs.push(msg),
            None => groups.push((msg.contact.as_str(), vec![msg])),
        }
    }
    groups
}

/// Bounded prompt-facing summary of message activity
pub fn activity_text(messages: &[AnonymizedMessage]) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let mut text = String::from("Recent message activity:\n");
    for (contact, msgs) in group_by_contact(messages) {
        text.push_str(&format!("\n{}: {} messages\n", contact, msgs.len()));
        for msg in msgs.iter().take(SAMPLES_PER_CONTACT) {
            let sender = if msg.from_user { "User" } else { contact };
            let sample = truncate_chars(&msg.text, SAMPLE_CHARS);
            let ellipsis = if msg.text.chars().count() > SAMPLE_CHARS {
                "..."
            } else {
                ""
            };
            text.push_str(&format!("  {}: {}{}\n", sender, sample, ellipsis));
        }
    }

    truncate_chars(&text, MAX_ACTIVITY_CHARS)
}

fn apple_timestamp(at: DateTime<Utc>) -> i64 {
    (at.timestamp() - APPLE_EPOCH_OFFSET_SECS) * NANOS_PER_SEC
}

fn from_apple_timestamp(nanos: i64) -> DateTime<Utc> {
    let secs = nanos.div_euclid(NANOS_PER_SEC) + APPLE_EPOCH_OFFSET_SECS;
    let subsec = nanos.rem_euclid(NANOS_PER_SEC) as u32;
    Utc.timestamp_opt(secs, subsec)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(contact: &str, text: &str, is_from_me: bool) -> RawMessage {
        RawMessage {
            text: text.to_string(),
            date: Utc::now(),
            is_from_me,
            contact: contact.to_string(),
        }
    }

    #[test]
    fn test_contacts_anonymized_in_first_seen_order() {
        let messages = anonymize(vec![
            raw("+15550001", "hi", false),
            raw("bob@example.com", "yo", false),
            raw("+15550001", "back", true),
        ]);

        let contacts: Vec<_> = messages.iter().map(|m| m.contact.as_str()).collect();
        assert_eq!(contacts, vec!["Contact_1", "Contact_2", "Contact_1"]);
        assert!(messages.iter().all(|m| !m.contact.contains('@')));
    }

    #[test]
    fn test_activity_text_samples_and_truncation() {
        let long = "x".repeat(80);
        let messages = anonymize(vec![
            raw("a", &long, false),
            raw("a", "two", true),
            raw("a", "three", false),
            raw("a", "four", false),
        ]);

        let text = activity_text(&messages);
        assert!(text.starts_with("Recent message activity:"));
        assert!(text.contains("Contact_1: 4 messages"));
        assert!(text.contains(&format!("  Contact_1: {}...", "x".repeat(50))));
        assert!(text.contains("  User: two"));
        assert!(!text.contains("four"), "Only three samples per contact");
    }

    #[test]
    fn test_activity_text_bounded() {
        let messages = anonymize(
            (0..200)
                .map(|i| raw(&format!("contact-{}", i), "hello there", false))
                .collect(),
        );
        assert!(activity_text(&messages).chars().count() <= MAX_ACTIVITY_CHARS);
    }

    #[test]
    fn test_apple_timestamp_conversion() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(from_apple_timestamp(apple_timestamp(at)), at);
        assert_eq!(
            from_apple_timestamp(0),
            Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_extract_summary_and_preview() {
        let extract = ConversationExtract::from_messages(anonymize(vec![
            raw("a", "1", false),
            raw("b", "2", false),
            raw("a", "3", true),
        ]));
        assert_eq!(extract.count, 3);
        assert_eq!(extract.contact_count, 2);
        assert_eq!(extract.preview, vec!["Contact_1: 2 messages", "Contact_2: 1 messages"]);
        assert_eq!(extract.summary, "Processed 3 messages from 2 contacts");
    }

    #[tokio::test]
    async fn test_missing_store_degrades() {
        let collector = MessageStoreCollector::new(
            Some(PathBuf::from("/nonexistent/Library/Messages/chat.db")),
            7,
            1000,
        );
        let extract = collector.extract().await;

        assert!(extract.messages.is_empty());
        assert!(!extract.is_ok());
        assert!(extract.summary.starts_with("Error accessing messages: "));
    }
}
