//! The job search pipeline.
//!
//! `optimize_query -> scan_web -> rank_and_summarize -> send_email`, run
//! strictly in order. The first stage error ends the run; only unreachable
//! pages inside `rank_and_summarize` are tolerated.

use crate::agent::{ChatPrompt, LanguageModel, Prompt};
use crate::config::WorkflowConfig;
use crate::error::{Stage, WorkflowError};
use crate::mailer::{compose_body, compose_subject, Mailer};
use crate::prompts::Prompts;
use crate::ranking::RankingEngine;
use crate::scraper::PageFetcher;
use crate::search::WebSearch;
use crate::state::{Initialized, PostsRanked, QueryOptimized, WebScanned, WorkflowState};
use crate::summarizer::Summarizer;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// The external services a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub agent: Arc<dyn LanguageModel>,
    pub search: Arc<dyn WebSearch>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub mailer: Arc<dyn Mailer>,
}

pub struct JobSearchWorkflow {
    agent: Arc<dyn LanguageModel>,
    search: Arc<dyn WebSearch>,
    mailer: Arc<dyn Mailer>,
    summarizer: Summarizer,
    ranking: RankingEngine,
    config: WorkflowConfig,
    prompts: Prompts,
}

impl JobSearchWorkflow {
    pub fn new(collaborators: Collaborators, config: WorkflowConfig, prompts: Prompts) -> Self {
        let summarizer = Summarizer::new(
            collaborators.agent.clone(),
            collaborators.fetcher,
            config.concurrency,
            config.fetch_timeout,
            config.max_page_chars.get(),
        );
        let ranking = RankingEngine::new(collaborators.agent.clone(), prompts.clone());

        Self {
            agent: collaborators.agent,
            search: collaborators.search,
            mailer: collaborators.mailer,
            summarizer,
            ranking,
            config,
            prompts,
        }
    }

    /// System instruction plus the caller's request, or the default request
    pub fn initial_state(&self, user_message: Option<&str>) -> Initialized {
        let user = user_message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or(self.prompts.user.as_str());
        Initialized::new(ChatPrompt::new(self.prompts.system.clone(), user))
    }

    /// Run all four stages and return the final state.
    #[instrument(skip_all)]
    pub async fn run(&self, user_message: Option<&str>) -> Result<WorkflowState, WorkflowError> {
        info!("starting job search workflow");

        let result = self.execute(self.initial_state(user_message)).await;
        match &result {
            Ok(state) => info!(
                ranked = state.ranked_posts.len(),
                "job search workflow completed successfully"
            ),
            Err(e) => error!(stage = %e.stage(), error = %e, "job search workflow failed"),
        }
        result
    }

    async fn execute(&self, state: Initialized) -> Result<WorkflowState, WorkflowError> {
        let state = self.optimize_query(state).await?;
        let state = self.scan_web(state).await?;
        let state = self.rank_and_summarize(state).await?;
        self.send_email(state).await
    }

    /// Turn the natural-language request into a boolean search query
    #[instrument(skip_all, fields(stage = %Stage::OptimizeQuery))]
    async fn optimize_query(&self, state: Initialized) -> Result<QueryOptimized, WorkflowError> {
        info!("starting prompt optimization");

        let response = self
            .agent
            .complete(Prompt::Chat(state.prompt()))
            .await
            .map_err(|e| WorkflowError::collaborator(Stage::OptimizeQuery, e))?;
        let query = response.trim().to_string();

        info!(%query, "generated optimized search query");
        Ok(state.with_query(query))
    }

    /// Collect result URLs from every configured search page, in page order
    #[instrument(skip_all, fields(stage = %Stage::ScanWeb))]
    async fn scan_web(&self, state: QueryOptimized) -> Result<WebScanned, WorkflowError> {
        let max_pages = self.config.max_search_pages.get();
        info!(max_pages, "starting web search");

        let mut urls = Vec::new();
        for page in 0..max_pages {
            info!("searching page {} of {}", page + 1, max_pages);
            let offset = page * self.config.results_per_page.get();
            let hits = self
                .search
                .search(state.optimized_query(), offset, &self.config.recency)
                .await
                .map_err(|e| WorkflowError::collaborator(Stage::ScanWeb, e))?;
            urls.extend(hits.into_iter().map(|hit| hit.url));
        }

        info!(found = urls.len(), "web search completed");
        Ok(state.with_urls(urls))
    }

    /// Summarize every reachable posting, then have the model pick the best ones
    #[instrument(skip_all, fields(stage = %Stage::RankAndSummarize))]
    async fn rank_and_summarize(&self, state: WebScanned) -> Result<PostsRanked, WorkflowError> {
        info!("starting job analysis and ranking");

        let summaries = self
            .summarizer
            .summarize(state.urls())
            .await
            .map_err(|e| WorkflowError::collaborator(Stage::RankAndSummarize, e))?;

        let ranked = self
            .ranking
            .rank(
                state.criteria(),
                &summaries,
                state.urls(),
                self.config.top_rank_count.get(),
            )
            .await
            .map_err(|e| WorkflowError::from_rank(Stage::RankAndSummarize, e))?;

        info!(selected = ranked.len(), "job ranking completed");
        Ok(state.with_ranked_posts(ranked))
    }

    /// Email the shortlist to the configured recipient
    #[instrument(skip_all, fields(stage = %Stage::SendEmail))]
    async fn send_email(&self, state: PostsRanked) -> Result<WorkflowState, WorkflowError> {
        info!("sending email with job results");

        let subject = compose_subject(chrono::Local::now().date_naive());
        let body = compose_body(state.ranked_posts());
        self.mailer
            .send_email(&self.config.recipient_email, &subject, &body)
            .await
            .map_err(|e| WorkflowError::collaborator(Stage::SendEmail, e))?;

        info!(to = %self.config.recipient_email, "email sent successfully");
        Ok(state.finish())
    }
}
