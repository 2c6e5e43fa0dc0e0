//! Title metadata lookup against The Movie Database.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::MetadataConfig;

/// Episode runtime assumed for series that list none.
const DEFAULT_EPISODE_RUNTIME: i32 = 40;

/// Coarse classification of a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Unknown,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
            Self::Unknown => "unknown",
        }
    }
}

/// Duration information for a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    pub title: String,
    pub duration_minutes: i32,
    pub media_type: MediaType,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Metadata lookup is not configured (set TMDB_API_KEY)")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Metadata API returned status {0}")]
    Status(u16),

    #[error("Failed to parse metadata response: {0}")]
    Parse(String),

    #[error("No results found for: {0}")]
    NoResults(String),

    #[error("Unknown media type for: {0}")]
    UnknownMediaType(String),

    #[error("No runtime listed for: {0}")]
    NoRuntime(String),
}

/// Looks up a title's runtime by name.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup(&self, title: &str) -> Result<ContentInfo, MetadataError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    #[serde(default)]
    runtime: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct TvDetails {
    #[serde(default)]
    episode_run_time: Vec<i32>,
}

/// Which details endpoint a search hit belongs to.
fn classify(hit: &SearchResult) -> MediaType {
    let has = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.is_empty());
    match hit.media_type.as_deref().unwrap_or_default() {
        "movie" => MediaType::Movie,
        "tv" => MediaType::Tv,
        "" if has(&hit.title) => MediaType::Movie,
        _ if has(&hit.name) => MediaType::Tv,
        _ => MediaType::Unknown,
    }
}

/// Integer mean of the listed episode runtimes.
fn average_runtime(runtimes: &[i32]) -> i32 {
    if runtimes.is_empty() {
        return DEFAULT_EPISODE_RUNTIME;
    }
    runtimes.iter().sum::<i32>() / runtimes.len() as i32
}

/// TMDB v3 client: multi-search, then movie or TV details.
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(config: &MetadataConfig) -> Result<Self, MetadataError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(MetadataError::NotConfigured)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .gzip(true)
            .build()
            .map_err(|e| MetadataError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, MetadataError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| MetadataError::Http(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api_key", &self.api_key);
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, MetadataError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MetadataError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MetadataError::Status(resp.status().as_u16()));
        }

        resp.json()
            .await
            .map_err(|e| MetadataError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MetadataLookup for TmdbClient {
    async fn lookup(&self, title: &str) -> Result<ContentInfo, MetadataError> {
        let search: SearchResponse = self
            .get(self.endpoint("/search/multi", &[("query", title)])?)
            .await?;

        let hit = search
            .results
            .first()
            .ok_or_else(|| MetadataError::NoResults(title.to_string()))?;

        let media_type = classify(hit);
        let duration_minutes = match media_type {
            MediaType::Movie => {
                let details: MovieDetails = self
                    .get(self.endpoint(&format!("/movie/{}", hit.id), &[])?)
                    .await?;
                details
                    .runtime
                    .filter(|r| *r > 0)
                    .ok_or_else(|| MetadataError::NoRuntime(title.to_string()))?
            }
            MediaType::Tv => {
                let details: TvDetails = self
                    .get(self.endpoint(&format!("/tv/{}", hit.id), &[])?)
                    .await?;
                average_runtime(&details.episode_run_time)
            }
            MediaType::Unknown => return Err(MetadataError::UnknownMediaType(title.to_string())),
        };

        debug!(
            "TMDB: '{}' is {} ({} min)",
            title,
            media_type.as_str(),
            duration_minutes
        );
        Ok(ContentInfo {
            title: title.to_string(),
            duration_minutes,
            media_type,
        })
    }
}
