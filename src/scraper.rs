//! Page fetching for job postings.
//!
//! Uses reqwest for fetching and scraper for HTML parsing. A page that cannot be
//! fetched is reported as `None`, never as an error: losing one posting must not
//! stop a run.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// User-Agent string identifying this fetcher
const USER_AGENT: &str = concat!("jobscout/", env!("CARGO_PKG_VERSION"));

/// Why a page was skipped. Only ever logged.
#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("failed to fetch URL: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("no content found at URL")]
    NoContent,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Readable text of the page, or `None` if it could not be retrieved in time
    async fn fetch_page(&self, url: &str, timeout: Duration) -> Option<String>;
}

/// reqwest-based fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        let html = response.text().await?;

        let document = Html::parse_document(&html);
        let text = extract_text(&document);
        if text.trim().is_empty() {
            return Err(ScraperError::NoContent);
        }

        Ok(match extract_title(&document) {
            Some(title) => format!("{title}\n\n{text}"),
            None => text,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str, timeout: Duration) -> Option<String> {
        match self.fetch_text(url, timeout).await {
            Ok(text) => {
                debug!(%url, chars = text.len(), "fetched page");
                Some(text)
            }
            Err(e) => {
                warn!(%url, error = %e, "failed to fetch page content");
                None
            }
        }
    }
}

/// Extract the page title from <title> or <h1>
fn extract_title(document: &Html) -> Option<String> {
    ["title", "h1"].into_iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        let element = document.select(&selector).next()?;
        let title: String = element.text().collect();
        let title = title.trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}

/// Extract readable text content from the page
fn extract_text(document: &Html) -> String {
    // Posting bodies usually sit in one of these regions
    let main_selectors = ["article", "main", "[role='main']", ".job-description", "#content"];

    for selector_str in main_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = extract_text_from_element(&Html::parse_fragment(&element.html()));
                if !text.trim().is_empty() {
                    return text;
                }
            }
        }
    }

    extract_text_from_element(document)
}

/// Extract text from paragraphs, headings and list items, skipping fragments
fn extract_text_from_element(document: &Html) -> String {
    let Ok(content_selector) = Selector::parse("p, h1, h2, h3, h4, h5, h6, li") else {
        return String::new();
    };

    document
        .select(&content_selector)
        .map(|element| {
            let text: String = element.text().collect::<Vec<_>>().join(" ");
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|cleaned| cleaned.len() > 20)
        .collect::<Vec<_>>()
        .join("\n\n")
}
