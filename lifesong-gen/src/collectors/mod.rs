//! Personal data collectors
//!
//! Each collector fetches one external source with a caller-supplied
//! credential and normalizes it into a `SummaryFragment`. `gather` runs a
//! set of collectors concurrently and fuses whatever succeeded into a
//! `CollectorSummary`; a failed source is dropped, never fatal.

pub mod gmail;
pub mod messages;
pub mod spotify;

pub use gmail::GmailCollector;
pub use messages::{ConversationExtract, MessageStoreCollector};
pub use spotify::SpotifyCollector;

use crate::types::{BackendError, CollectorSummary, Correspondence, MusicTaste, SourceKind};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Source reachable but had nothing to contribute
    #[error("no data: {0}")]
    NoData(String),

    /// Local source could not be read
    #[error("{0}")]
    Unavailable(String),
}

/// Normalized output of one collector
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryFragment {
    MusicTaste(MusicTaste),
    Correspondence(Correspondence),
    MessageActivity { text: String, message_count: usize },
}

impl SummaryFragment {
    pub fn item_count(&self) -> usize {
        match self {
            SummaryFragment::MusicTaste(taste) => taste.top_artists.len() + taste.top_tracks.len(),
            SummaryFragment::Correspondence(mail) => mail.count,
            SummaryFragment::MessageActivity { message_count, .. } => *message_count,
        }
    }
}

#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    fn source(&self) -> SourceKind;

    async fn collect(&self) -> Result<SummaryFragment, CollectorError>;
}

/// Per-source outcome of a gather
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source: SourceKind,
    pub ok: bool,
    pub item_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Run collectors concurrently and fuse the successes
pub async fn gather(collectors: &[Box<dyn Collector>]) -> (CollectorSummary, Vec<SourceReport>) {
    let outcomes = join_all(collectors.iter().map(|collector| async move {
        (collector.source(), collector.collect().await)
    }))
    .await;

    let mut summary = CollectorSummary::default();
    let mut reports = Vec::with_capacity(outcomes.len());

    for (source, outcome) in outcomes {
        match outcome {
            Ok(fragment) => {
                let item_count = fragment.item_count();
                tracing::info!(%source, item_count, "Collector succeeded");
                reports.push(SourceReport {
                    source,
                    ok: true,
                    item_count,
                    detail: None,
                });
                merge(&mut summary, fragment);
            }
            Err(e) => {
                tracing::warn!(%source, error = %e, "Collector degraded, source dropped");
                reports.push(SourceReport {
                    source,
                    ok: false,
                    item_count: 0,
                    detail: Some(e.to_string()),
                });
            }
        }
    }

    (summary, reports)
}

fn merge(summary: &mut CollectorSummary, fragment: SummaryFragment) {
    match fragment {
        SummaryFragment::MusicTaste(taste) => summary.music_taste = Some(taste),
        SummaryFragment::Correspondence(mail) => summary.recent_emails = Some(mail.recent_emails),
        SummaryFragment::MessageActivity { text, .. } => summary.message_activity = Some(text),
    }
}
