//! Web search for job posting URLs.
//!
//! [`SerpApiClient`] queries Google through SerpAPI, one result page per call.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("search provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("search provider error: {0}")]
    Api(String),
    #[error("configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

/// One organic search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: Option<String>,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Fetch one page of results starting at `page_offset`
    async fn search(
        &self,
        query: &str,
        page_offset: usize,
        recency: &str,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    link: String,
    #[serde(default)]
    title: Option<String>,
}

/// SerpAPI Google search client
pub struct SerpApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl SerpApiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SearchError> {
        Self::new(config.serpapi_key()?, config.search.base_url.clone())
    }
}

#[async_trait]
impl WebSearch for SerpApiClient {
    async fn search(
        &self,
        query: &str,
        page_offset: usize,
        recency: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let start = page_offset.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("start", start.as_str()),
                ("tbs", recency),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Provider { status, body });
        }

        let parsed: SerpResponse = response.json().await?;
        if let Some(message) = parsed.error {
            // SerpAPI reports an exhausted result set as an error string
            if parsed.organic_results.is_empty() && message.contains("hasn't returned any results") {
                return Ok(Vec::new());
            }
            return Err(SearchError::Api(message));
        }

        Ok(parsed
            .organic_results
            .into_iter()
            .map(|r| SearchHit {
                url: r.link,
                title: r.title,
            })
            .collect())
    }
}
