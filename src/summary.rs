//! Records produced while condensing and ranking postings.

use serde::{Deserialize, Serialize};

/// One-sentence summary of a fetched posting.
///
/// `index` is the posting's position in the search result list. Postings whose
/// page could not be fetched get no summary, so indices can have gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub index: usize,
    pub summary: String,
}

impl JobSummary {
    pub fn new(index: usize, summary: impl Into<String>) -> Self {
        Self {
            index,
            summary: summary.into(),
        }
    }

    /// The `INDEX/SUMMARY` line used in the ranking prompt
    pub fn prompt_line(&self) -> String {
        format!("INDEX: {}. SUMMARY: {}", self.index, self.summary)
    }
}

/// A selected posting with its URL attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedPost {
    pub index: usize,
    pub summary: String,
    pub url: String,
}

impl RankedPost {
    /// The email block for this posting
    pub fn email_block(&self) -> String {
        format!("Job Summary: {}\nJob URL: {}", self.summary, self.url)
    }
}
