//! # Jobscout
//!
//! Turns a plain-language job request into a ranked shortlist of postings and
//! emails it.
//!
//! ## Pipeline
//!
//! 1. **optimize_query**: the LLM rewrites the request as a boolean search query
//! 2. **scan_web**: result URLs are collected from several search pages
//! 3. **rank_and_summarize**: reachable postings are summarized concurrently,
//!    then the LLM picks the best matches
//! 4. **send_email**: the shortlist is mailed to the configured recipient
//!
//! The LLM, search provider, page fetcher and mailer sit behind traits
//! ([`LanguageModel`], [`WebSearch`], [`PageFetcher`], [`Mailer`]) so the
//! pipeline can run against any implementation.

pub mod agent;
pub mod config;
pub mod error;
pub mod mailer;
pub mod oauth;
pub mod parser;
pub mod prompts;
pub mod ranking;
pub mod scraper;
pub mod search;
pub mod state;
pub mod summarizer;
pub mod summary;
pub mod workflow;

pub use agent::{ChatPrompt, LanguageModel, Prompt};
pub use config::{Config, WorkflowConfig};
pub use error::{Stage, WorkflowError};
pub use mailer::Mailer;
pub use prompts::Prompts;
pub use scraper::PageFetcher;
pub use search::{SearchHit, WebSearch};
pub use state::WorkflowState;
pub use summary::{JobSummary, RankedPost};
pub use workflow::{Collaborators, JobSearchWorkflow};
