//! Ranking of summarized postings against the user's criteria.

use crate::agent::{AgentError, LanguageModel, Prompt};
use crate::parser::{parse_ranked_list, ParseError};
use crate::prompts::Prompts;
use crate::summary::{JobSummary, RankedPost};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Error, Debug)]
pub enum RankError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The model picked a posting that was never summarized
    #[error("ranked index {index} is not one of the summarized postings {available:?}")]
    IndexResolution { index: i64, available: Vec<usize> },
}

pub struct RankingEngine {
    agent: Arc<dyn LanguageModel>,
    prompts: Prompts,
}

impl RankingEngine {
    pub fn new(agent: Arc<dyn LanguageModel>, prompts: Prompts) -> Self {
        Self { agent, prompts }
    }

    /// Ask the model for the best `desired_count` postings and attach their URLs.
    ///
    /// Every returned index must name a summarized posting. Repeated URLs in
    /// the model's answer are dropped after the first.
    #[instrument(skip_all, fields(summaries = summaries.len(), desired_count = desired_count))]
    pub async fn rank(
        &self,
        criteria: &str,
        summaries: &[JobSummary],
        urls: &[String],
        desired_count: usize,
    ) -> Result<Vec<RankedPost>, RankError> {
        let effective_count = desired_count.min(summaries.len());
        if effective_count == 0 {
            debug!("nothing to rank");
            return Ok(Vec::new());
        }

        let prompt = self.build_prompt(criteria, summaries, effective_count);
        let response = self.agent.complete(Prompt::Text(&prompt)).await?;
        let selections = parse_ranked_list(&response)?;

        let available: BTreeSet<usize> = summaries
            .iter()
            .map(|s| s.index)
            .filter(|&i| i < urls.len())
            .collect();

        let mut seen_urls = HashSet::new();
        let mut ranked = Vec::with_capacity(selections.len());
        for selection in selections {
            let index = usize::try_from(selection.index)
                .ok()
                .filter(|i| available.contains(i))
                .ok_or_else(|| RankError::IndexResolution {
                    index: selection.index,
                    available: available.iter().copied().collect(),
                })?;

            let url = &urls[index];
            if !seen_urls.insert(url.as_str()) {
                warn!(index, %url, "dropping duplicate URL from ranking");
                continue;
            }

            ranked.push(RankedPost {
                index,
                summary: selection.summary,
                url: url.clone(),
            });
        }

        if ranked.len() != effective_count {
            warn!(
                requested = effective_count,
                returned = ranked.len(),
                "ranking returned a different number of postings than requested"
            );
        }

        Ok(ranked)
    }

    fn build_prompt(&self, criteria: &str, summaries: &[JobSummary], rank: usize) -> String {
        let postings = summaries
            .iter()
            .map(JobSummary::prompt_line)
            .collect::<Vec<_>>()
            .join("\n\n");
        self.prompts.render_ranking(criteria, &postings, rank)
    }
}
