//! Workflow state, one type per stage.
//!
//! Each stage consumes the previous stage's record and returns the next one,
//! so a field can only be read once the stage that writes it has run:
//!
//! ```text
//! Initialized -> QueryOptimized -> WebScanned -> PostsRanked -> WorkflowState
//! ```

use crate::agent::ChatPrompt;
use crate::summary::RankedPost;
use serde::Serialize;

/// Prompt built, nothing run yet
#[derive(Debug, Clone)]
pub struct Initialized {
    prompt: ChatPrompt,
}

impl Initialized {
    pub fn new(prompt: ChatPrompt) -> Self {
        Self { prompt }
    }

    pub fn prompt(&self) -> &ChatPrompt {
        &self.prompt
    }

    pub fn with_query(self, optimized_query: String) -> QueryOptimized {
        QueryOptimized {
            prompt: self.prompt,
            optimized_query,
        }
    }
}

/// The search query has been written
#[derive(Debug, Clone)]
pub struct QueryOptimized {
    prompt: ChatPrompt,
    optimized_query: String,
}

impl QueryOptimized {
    pub fn optimized_query(&self) -> &str {
        &self.optimized_query
    }

    pub fn with_urls(self, urls: Vec<String>) -> WebScanned {
        WebScanned {
            prompt: self.prompt,
            optimized_query: self.optimized_query,
            urls,
        }
    }
}

/// Search result URLs are known
#[derive(Debug, Clone)]
pub struct WebScanned {
    prompt: ChatPrompt,
    optimized_query: String,
    urls: Vec<String>,
}

impl WebScanned {
    /// The user's original request, used as ranking criteria
    pub fn criteria(&self) -> &str {
        &self.prompt.user
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn with_ranked_posts(self, ranked_posts: Vec<RankedPost>) -> PostsRanked {
        PostsRanked {
            prompt: self.prompt,
            optimized_query: self.optimized_query,
            urls: self.urls,
            ranked_posts,
        }
    }
}

/// The shortlist is ready to send
#[derive(Debug, Clone)]
pub struct PostsRanked {
    prompt: ChatPrompt,
    optimized_query: String,
    urls: Vec<String>,
    ranked_posts: Vec<RankedPost>,
}

impl PostsRanked {
    pub fn ranked_posts(&self) -> &[RankedPost] {
        &self.ranked_posts
    }

    /// Mark the run complete
    pub fn finish(self) -> WorkflowState {
        WorkflowState {
            system_prompt: self.prompt.system,
            user_request: self.prompt.user,
            optimized_query: self.optimized_query,
            urls: self.urls,
            ranked_posts: self.ranked_posts,
        }
    }
}

/// Everything a completed run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowState {
    pub system_prompt: String,
    pub user_request: String,
    pub optimized_query: String,
    pub urls: Vec<String>,
    pub ranked_posts: Vec<RankedPost>,
}
