//! LLM agent module.
//!
//! [`LanguageModel`] is the completion seam the workflow talks to; [`GeminiAgent`]
//! implements it with rstructor.

use crate::config::Config;
use async_trait::async_trait;
use rstructor::{GeminiClient, GeminiModel, LLMClient};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

/// System instruction plus user request, sent together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

impl ChatPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// What a completion call is asked with.
#[derive(Debug, Clone, Copy)]
pub enum Prompt<'a> {
    Chat(&'a ChatPrompt),
    Text(&'a str),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt and return the raw response text
    async fn complete(&self, prompt: Prompt<'_>) -> Result<String, AgentError>;
}

/// Gemini-backed completion
pub struct GeminiAgent {
    client: GeminiClient,
}

impl GeminiAgent {
    /// Build the client from the `[agent]` section and the API key
    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        let api_key = config.api_key()?;
        let model = parse_gemini_model(&config.agent.model);

        let client = GeminiClient::new(api_key)
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?
            .model(model);

        Ok(Self { client })
    }
}

#[async_trait]
impl LanguageModel for GeminiAgent {
    async fn complete(&self, prompt: Prompt<'_>) -> Result<String, AgentError> {
        let text = render_prompt(prompt);
        tracing::debug!(prompt_length = text.len(), "calling Gemini");

        let result = self
            .client
            .generate_with_metadata(&text)
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;

        Ok(result.text.trim().to_string())
    }
}

/// Flatten a prompt into the single text body Gemini receives
fn render_prompt(prompt: Prompt<'_>) -> String {
    match prompt {
        Prompt::Chat(chat) => format!("{}\n\n---\n\n{}", chat.system, chat.user),
        Prompt::Text(text) => text.to_string(),
    }
}

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> GeminiModel {
    match model {
        "gemini-2.0-flash" => GeminiModel::Gemini20Flash,
        "gemini-2.5-flash" => GeminiModel::Gemini25Flash,
        "gemini-2.5-pro" => GeminiModel::Gemini25Pro,
        _ => GeminiModel::Gemini20Flash, // Default
    }
}
