//! Fetch-and-summarize fan-out over the search results.

use crate::agent::{AgentError, LanguageModel, Prompt};
use crate::prompts::Prompts;
use crate::scraper::PageFetcher;
use crate::summary::JobSummary;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Condenses each fetchable posting to one sentence.
///
/// Up to `concurrency` postings are in flight at once. Results are keyed by
/// their position in the input so output order never depends on which fetch
/// finishes first.
pub struct Summarizer {
    agent: Arc<dyn LanguageModel>,
    fetcher: Arc<dyn PageFetcher>,
    concurrency: NonZeroUsize,
    fetch_timeout: Duration,
    max_page_chars: usize,
}

impl Summarizer {
    pub fn new(
        agent: Arc<dyn LanguageModel>,
        fetcher: Arc<dyn PageFetcher>,
        concurrency: NonZeroUsize,
        fetch_timeout: Duration,
        max_page_chars: usize,
    ) -> Self {
        Self {
            agent,
            fetcher,
            concurrency,
            fetch_timeout,
            max_page_chars,
        }
    }

    /// Summaries for every URL whose page could be fetched, in input order.
    ///
    /// Unreachable pages are skipped; an LLM failure aborts the batch.
    #[instrument(skip_all, fields(urls = urls.len()))]
    pub async fn summarize(&self, urls: &[String]) -> Result<Vec<JobSummary>, AgentError> {
        let total = urls.len();
        let mut pending = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| self.summarize_one(index, url, total))
            .buffer_unordered(self.concurrency.get());

        let mut collected = BTreeMap::new();
        while let Some(outcome) = pending.next().await {
            if let Some(summary) = outcome? {
                collected.insert(summary.index, summary);
            }
        }

        info!(
            summarized = collected.len(),
            skipped = total - collected.len(),
            "summaries ready"
        );
        Ok(collected.into_values().collect())
    }

    async fn summarize_one(
        &self,
        index: usize,
        url: &str,
        total: usize,
    ) -> Result<Option<JobSummary>, AgentError> {
        info!("processing job posting {}/{}", index + 1, total);

        let Some(text) = self.fetcher.fetch_page(url, self.fetch_timeout).await else {
            warn!(%url, "skipping job posting {} - could not fetch content", index + 1);
            return Ok(None);
        };

        let prompt = Prompts::render_summary(truncate_chars(&text, self.max_page_chars));
        let summary = self.agent.complete(Prompt::Text(&prompt)).await?;
        Ok(Some(JobSummary::new(index, summary)))
    }
}

/// Cut `text` to at most `max` characters without splitting a code point
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_at, _)) => &text[..byte_at],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Echoes the last line of the prompt as the summary
    struct EchoAgent {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for EchoAgent {
        async fn complete(&self, prompt: Prompt<'_>) -> Result<String, AgentError> {
            let Prompt::Text(text) = prompt else {
                return Err(AgentError::RequestFailed("unexpected chat prompt".into()));
            };
            self.prompts.lock().unwrap().push(text.to_string());
            if text.contains("explode") {
                return Err(AgentError::RequestFailed("quota exceeded".into()));
            }
            Ok(format!("summary of {}", text.lines().last().unwrap_or_default()))
        }
    }

    /// Serves canned pages; later URLs answer sooner so completion order is reversed
    struct CannedFetcher {
        pages: HashMap<String, Option<String>>,
    }

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn fetch_page(&self, url: &str, _timeout: Duration) -> Option<String> {
            let delay = 50u64.saturating_sub(url.len() as u64 * 2);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.pages.get(url).cloned().flatten()
        }
    }

    fn summarizer(pages: &[(&str, Option<&str>)], concurrency: usize) -> (Summarizer, Arc<EchoAgent>) {
        let agent = Arc::new(EchoAgent {
            prompts: Mutex::new(Vec::new()),
        });
        let fetcher = Arc::new(CannedFetcher {
            pages: pages
                .iter()
                .map(|(url, page)| (url.to_string(), page.map(str::to_string)))
                .collect(),
        });
        let summarizer = Summarizer::new(
            agent.clone(),
            fetcher,
            NonZeroUsize::new(concurrency).unwrap(),
            Duration::from_secs(30),
            10_000,
        );
        (summarizer, agent)
    }

    fn urls(pages: &[(&str, Option<&str>)]) -> Vec<String> {
        pages.iter().map(|(url, _)| url.to_string()).collect()
    }

    #[tokio::test]
    async fn skipped_pages_leave_index_gaps() {
        let pages = [
            ("u0", Some("page zero")),
            ("u1", None),
            ("u22", Some("page two")),
        ];
        let (summarizer, _) = summarizer(&pages, 3);

        let summaries = summarizer.summarize(&urls(&pages)).await.unwrap();
        assert_eq!(
            summaries,
            vec![
                JobSummary::new(0, "summary of page zero"),
                JobSummary::new(2, "summary of page two"),
            ]
        );
    }

    #[tokio::test]
    async fn order_follows_input_not_completion() {
        let pages: Vec<(String, Option<String>)> = (0..8)
            .map(|i| ("x".repeat(i + 1), Some(format!("page {i}"))))
            .collect();
        let borrowed: Vec<(&str, Option<&str>)> = pages
            .iter()
            .map(|(u, p)| (u.as_str(), p.as_deref()))
            .collect();
        let (summarizer, _) = summarizer(&borrowed, 4);

        let summaries = summarizer.summarize(&urls(&borrowed)).await.unwrap();
        let indices: Vec<usize> = summaries.iter().map(|s| s.index).collect();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn all_fetches_failing_is_empty_not_error() {
        let pages = [("a", None), ("b", None)];
        let (summarizer, agent) = summarizer(&pages, 2);

        let summaries = summarizer.summarize(&urls(&pages)).await.unwrap();
        assert!(summaries.is_empty());
        assert!(agent.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_urls_keep_both_positions() {
        let pages = [("same", Some("page"))];
        let (summarizer, _) = summarizer(&pages, 2);

        let input = vec!["same".to_string(), "same".to_string()];
        let summaries = summarizer.summarize(&input).await.unwrap();
        let indices: Vec<usize> = summaries.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn llm_failure_aborts_batch() {
        let pages = [("ok", Some("fine")), ("bad", Some("explode"))];
        let (summarizer, _) = summarizer(&pages, 1);

        let err = summarizer.summarize(&urls(&pages)).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn page_text_is_truncated_before_prompting() {
        let long = "é".repeat(50);
        let pages = [("u", Some(long.as_str()))];
        let (mut summarizer, agent) = summarizer(&pages, 1);
        summarizer.max_page_chars = 10;

        summarizer.summarize(&urls(&pages)).await.unwrap();
        let prompts = agent.prompts.lock().unwrap();
        assert!(prompts[0].ends_with(&"é".repeat(10)));
        assert!(!prompts[0].contains(&"é".repeat(11)));
    }

    /// Counts how many fetches overlap
    #[derive(Default)]
    struct GaugedFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for GaugedFetcher {
        async fn fetch_page(&self, url: &str, _timeout: Duration) -> Option<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Some(format!("page at {url}"))
        }
    }

    #[tokio::test]
    async fn fetches_never_exceed_concurrency() {
        let fetcher = Arc::new(GaugedFetcher::default());
        let agent = Arc::new(EchoAgent {
            prompts: Mutex::new(Vec::new()),
        });
        let summarizer = Summarizer::new(
            agent,
            fetcher.clone(),
            NonZeroUsize::new(3).unwrap(),
            Duration::from_secs(30),
            10_000,
        );
        let input: Vec<String> = (0..12).map(|i| format!("https://jobs.example/{i}")).collect();

        let summaries = summarizer.summarize(&input).await.unwrap();

        assert_eq!(summaries.len(), 12);
        let peak = fetcher.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "{peak} fetches ran at once");
        assert!(peak > 1, "fetches never overlapped");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("häll", 2), "hä");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 0), "");
    }
}
