//! Music-taste collector (Spotify Web API)

use super::{Collector, CollectorError, SummaryFragment};
use crate::http::{ensure_success, json_body};
use crate::types::{ArtistSummary, BackendError, MusicTaste, SourceKind, TrackSummary, MAX_ITEMS_PER_SOURCE};
use serde::Deserialize;

const SERVICE: &str = "Spotify";
const TIME_RANGE: &str = "medium_term";

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct ArtistItem {
    name: String,
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Deserialize)]
struct TrackItem {
    name: String,
    #[serde(default)]
    artists: Vec<NamedItem>,
}

#[derive(Deserialize)]
struct NamedItem {
    name: String,
}

pub struct SpotifyCollector {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl SpotifyCollector {
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

    /// Fetch top artists and top tracks concurrently; either failing fails
    /// the whole collector
    pub async fn fetch(&self) -> Result<MusicTaste, BackendError> {
        let (artists, tracks) = tokio::try_join!(
            self.top::<ArtistItem>("artists"),
            self.top::<TrackItem>("tracks")
        )?;

        let top_artists = artists
            .into_iter()
            .map(|artist| ArtistSummary {
                name: artist.name,
                genres: dedup_preserving_order(artist.genres),
            })
            .collect();

        let top_tracks = tracks
            .into_iter()
            .map(|track| TrackSummary {
                name: track.name,
                artist: track
                    .artists
                    .into_iter()
                    .next()
                    .map(|a| a.name)
                    .unwrap_or_default(),
            })
            .collect();

        Ok(MusicTaste {
            top_artists,
            top_tracks,
        }
        .bounded())
    }

    async fn top<T: serde::de::DeserializeOwned>(&self, kind: &str) -> Result<Vec<T>, BackendError> {
        let url = format!("{}/me/top/{}", self.api_base, kind);
        let limit = MAX_ITEMS_PER_SOURCE.to_string();

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("limit", limit.as_str()), ("time_range", TIME_RANGE)])
            .send()
            .await
            .map_err(|e| BackendError::transport(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        let page: Page<T> = json_body(SERVICE, response).await?;
        Ok(page.items)
    }
}

#[async_trait::async_trait]
impl Collector for SpotifyCollector {
    fn source(&self) -> SourceKind {
        SourceKind::MusicTaste
    }

    async fn collect(&self) -> Result<SummaryFragment, CollectorError> {
        let taste = self.fetch().await?;
        if taste.is_empty() {
            return Err(CollectorError::NoData(
                "no top artists or tracks on this account".to_string(),
            ));
        }
        Ok(SummaryFragment::MusicTaste(taste))
    }
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
