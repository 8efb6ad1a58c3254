//! In-memory collaborators for driving the workflow in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use jobscout::agent::AgentError;
use jobscout::mailer::MailError;
use jobscout::prompts::SUMMARIZE_INSTRUCTION;
use jobscout::search::SearchError;
use jobscout::{
    Collaborators, Config, JobSearchWorkflow, LanguageModel, Mailer, PageFetcher, Prompt,
    Prompts, SearchHit, WebSearch,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers chat prompts with a query, summary prompts with an echo, and
/// anything else with the canned ranking response.
pub struct ScriptedAgent {
    pub query: String,
    pub ranking_response: String,
    pub chat_prompts: Mutex<Vec<(String, String)>>,
    pub ranking_prompts: Mutex<Vec<String>>,
    pub summary_calls: Mutex<usize>,
}

impl ScriptedAgent {
    pub fn new(ranking_response: &str) -> Arc<Self> {
        Arc::new(Self {
            query: "(\"data scientist\" OR \"ML engineer\") healthcare".to_string(),
            ranking_response: ranking_response.to_string(),
            chat_prompts: Mutex::new(Vec::new()),
            ranking_prompts: Mutex::new(Vec::new()),
            summary_calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl LanguageModel for ScriptedAgent {
    async fn complete(&self, prompt: Prompt<'_>) -> Result<String, AgentError> {
        match prompt {
            Prompt::Chat(chat) => {
                self.chat_prompts
                    .lock()
                    .unwrap()
                    .push((chat.system.clone(), chat.user.clone()));
                Ok(format!("  {}\n", self.query))
            }
            Prompt::Text(text) if text.starts_with(SUMMARIZE_INSTRUCTION) => {
                *self.summary_calls.lock().unwrap() += 1;
                let page = text.lines().last().unwrap_or_default();
                Ok(format!("Summary: {page}"))
            }
            Prompt::Text(text) => {
                self.ranking_prompts.lock().unwrap().push(text.to_string());
                Ok(self.ranking_response.clone())
            }
        }
    }
}

/// Serves fixed result pages keyed by offset
pub struct FakeSearch {
    pub pages: HashMap<usize, Vec<String>>,
    pub fail: bool,
    pub calls: Mutex<Vec<(String, usize, String)>>,
}

impl FakeSearch {
    /// `pages[n]` is returned for offset `n * 10`
    pub fn new(pages: &[&[&str]]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages
                .iter()
                .enumerate()
                .map(|(n, urls)| (n * 10, urls.iter().map(|u| u.to_string()).collect()))
                .collect(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            pages: HashMap::new(),
            fail: true,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(
        &self,
        query: &str,
        page_offset: usize,
        recency: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), page_offset, recency.to_string()));
        if self.fail {
            return Err(SearchError::Api("Invalid API key.".to_string()));
        }
        Ok(self
            .pages
            .get(&page_offset)
            .map(|urls| {
                urls.iter()
                    .map(|url| SearchHit {
                        url: url.clone(),
                        title: None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Page text per URL; URLs not listed fail to fetch
pub struct FakeFetcher {
    pub pages: HashMap<String, String>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new(pages: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages
                .iter()
                .map(|(url, text)| (url.to_string(), text.to_string()))
                .collect(),
            fetched: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch_page(&self, url: &str, _timeout: Duration) -> Option<String> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentEmail>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::TokenRefresh("invalid_grant".to_string()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// A workflow over the given fakes using default settings
pub fn workflow(
    agent: Arc<ScriptedAgent>,
    search: Arc<FakeSearch>,
    fetcher: Arc<FakeFetcher>,
    mailer: Arc<RecordingMailer>,
) -> JobSearchWorkflow {
    let mut config = Config::default();
    config.email.recipient = "seeker@example.com".to_string();
    let collaborators = Collaborators {
        agent,
        search,
        fetcher,
        mailer,
    };
    JobSearchWorkflow::new(
        collaborators,
        config.workflow_config().unwrap(),
        Prompts::default(),
    )
}
