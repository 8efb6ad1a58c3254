//! Prompt templates used by the workflow.
//!
//! The ranking template understands three placeholders: `{criteria}`,
//! `{postings}` and `{rank}`.

use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "\
# Role
You turn plain-language job requests into Google boolean search queries.

# Task
Rewrite the request below as one optimized boolean query that finds individual job postings.

# Requirements
- Output ONLY the query
- Aim at specific postings, not job boards or career advice pages
- Use boolean operators (AND, OR, quotes, parentheses) where they help
- Include common synonyms and title variations
- Exclude generic career sites and aggregators

# Output Format
The query on a single line, with no explanation.";

const DEFAULT_USER_REQUEST: &str = "\
Find Data Scientist OR Machine Learning Engineer positions in the healthcare/medical industry.

Requirements:
- Industries: Healthcare, Medical, Health Tech
- Locations: New York City, Chicago, San Francisco, Philadelphia, or Remote";

const RANKING_TEMPLATE: &str = "\
# Search Criteria
{criteria}

# Candidate Postings
Each posting below is listed with its index and a one-sentence summary:

{postings}

# Task
Rank these postings by how well they match the search criteria.

# Selection Criteria (most important first)
1. Relevance to the requested role and its requirements
2. Industry fit
3. Experience level fit
4. Geography and location preference
5. Company reputation and role quality

# Rules
- The posting must still be accepting applications
- Select exactly {rank} postings
- Never select two postings with the same URL or from the same company
- Keep each summary to one sentence

# Output Format
A JSON array and nothing else:
[
  {\"index\": <index from the list above>, \"summary\": \"<one sentence summary>\"}
]";

/// Instruction used to condense a single page before ranking.
pub const SUMMARIZE_INSTRUCTION: &str = "Summarize the following job posting in 1 brief sentence:";

/// Prompt set for a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Prompts {
    /// System instruction for query optimization
    pub system: String,
    /// Request used when the caller supplies none
    pub user: String,
    /// Ranking template
    pub ranking: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            user: DEFAULT_USER_REQUEST.to_string(),
            ranking: RANKING_TEMPLATE.to_string(),
        }
    }
}

impl Prompts {
    /// Fill the ranking template.
    pub fn render_ranking(&self, criteria: &str, postings: &str, rank: usize) -> String {
        self.ranking
            .replace("{criteria}", criteria)
            .replace("{postings}", postings)
            .replace("{rank}", &rank.to_string())
    }

    /// Build the single-page summarization prompt.
    pub fn render_summary(page_text: &str) -> String {
        format!("{SUMMARIZE_INSTRUCTION}\n\n{page_text}")
    }
}
