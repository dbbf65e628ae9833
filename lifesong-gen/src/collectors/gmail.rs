//! Correspondence collector (Gmail API)
//!
//! Lists recent inbox messages, then fetches Subject/From headers for the
//! first ten concurrently. A detail fetch that fails is skipped.

use super::{Collector, CollectorError, SummaryFragment};
use crate::http::{ensure_success, json_body};
use crate::types::{BackendError, Correspondence, EmailSummary, SourceKind, MAX_ITEMS_PER_SOURCE};
use futures::future::join_all;
use serde::Deserialize;

const SERVICE: &str = "Gmail";
const LIST_MAX_RESULTS: &str = "20";
const INBOX_QUERY: &str = "in:inbox newer_than:14d";
const NO_SUBJECT: &str = "No Subject";
const UNKNOWN_SENDER: &str = "Unknown Sender";

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct MessageDetail {
    #[serde(default)]
    payload: Payload,
}

#[derive(Default, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Deserialize)]
struct Header {
    name: String,
    value: String,
}

impl Payload {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

pub struct GmailCollector {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl GmailCollector {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    pub async fn fetch(&self) -> Result<Correspondence, BackendError> {
        let url = format!("{}/users/me/messages", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("maxResults", LIST_MAX_RESULTS), ("q", INBOX_QUERY)])
            .send()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        let list: MessageList = json_body(SERVICE, response).await?;

        let details = join_all(
            list.messages
                .iter()
                .take(MAX_ITEMS_PER_SOURCE)
                .map(|message| self.detail(&message.id)),
        )
        .await;

        let emails = details
            .into_iter()
            .filter_map(|detail| match detail {
                Ok(email) => Some(email),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping message detail");
                    None
                }
            })
            .collect();

        Ok(Correspondence::new(emails))
    }

    async fn detail(&self, id: &str) -> Result<EmailSummary, BackendError> {
        let url = format!("{}/users/me/messages/{}", self.api_base, id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "From"),
            ])
            .send()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        let detail: MessageDetail = json_body(SERVICE, response).await?;

        Ok(EmailSummary {
            subject: detail
                .payload
                .header("Subject")
                .unwrap_or(NO_SUBJECT)
                .to_string(),
            from: detail
                .payload
                .header("From")
                .unwrap_or(UNKNOWN_SENDER)
                .to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Collector for GmailCollector {
    fn source(&self) -> SourceKind {
        SourceKind::RecentEmails
    }

    async fn collect(&self) -> Result<SummaryFragment, CollectorError> {
        let correspondence = self.fetch().await?;
        if correspondence.count == 0 {
            return Err(CollectorError::NoData(
                "no inbox messages in the last 14 days".to_string(),
            ));
        }
        Ok(SummaryFragment::Correspondence(correspondence))
    }
}
