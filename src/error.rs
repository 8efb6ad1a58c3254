//! Run-level failures, tagged with the stage that raised them.

use crate::agent::AgentError;
use crate::mailer::MailError;
use crate::parser::ParseError;
use crate::ranking::RankError;
use crate::search::SearchError;
use std::fmt;
use thiserror::Error;

/// The four pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    OptimizeQuery,
    ScanWeb,
    RankAndSummarize,
    SendEmail,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::OptimizeQuery => "optimize_query",
            Stage::ScanWeb => "scan_web",
            Stage::RankAndSummarize => "rank_and_summarize",
            Stage::SendEmail => "send_email",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An external service the pipeline depends on failed
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error(transparent)]
    Llm(#[from] AgentError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Why a run stopped. Every variant names the stage that failed.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: CollaboratorError,
    },
    #[error("{stage} failed: {source}")]
    Parse {
        stage: Stage,
        #[source]
        source: ParseError,
    },
    #[error("{stage} failed: ranked index {index} is not one of the summarized postings {available:?}")]
    IndexResolution {
        stage: Stage,
        index: i64,
        available: Vec<usize>,
    },
}

impl WorkflowError {
    pub fn stage(&self) -> Stage {
        match self {
            WorkflowError::Collaborator { stage, .. }
            | WorkflowError::Parse { stage, .. }
            | WorkflowError::IndexResolution { stage, .. } => *stage,
        }
    }

    pub(crate) fn collaborator(stage: Stage, source: impl Into<CollaboratorError>) -> Self {
        WorkflowError::Collaborator {
            stage,
            source: source.into(),
        }
    }

    pub(crate) fn from_rank(stage: Stage, error: RankError) -> Self {
        match error {
            RankError::Agent(e) => Self::collaborator(stage, e),
            RankError::Parse(source) => WorkflowError::Parse { stage, source },
            RankError::IndexResolution { index, available } => WorkflowError::IndexResolution {
                stage,
                index,
                available,
            },
        }
    }
}
