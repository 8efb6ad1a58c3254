//! Configuration loading and management for jobscout.
//!
//! Loads settings from `jobscout.toml` with environment variable overrides for
//! API keys and the run knobs (`MAX_PAGES`, `TOP_RANK_COUNT`, `JOB_SEARCH_EMAIL`).

use crate::prompts::Prompts;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "jobscout.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("failed to render config: {0}")]
    RenderError(#[from] toml::ser::Error),
    #[error("missing required API key for provider: {0}")]
    MissingApiKey(String),
    #[error("unsupported LLM provider: {0}")]
    UnsupportedProvider(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// LLM provider, currently only "gemini"
    pub provider: String,
    /// Model identifier (e.g., "gemini-2.0-flash")
    pub model: String,
}

/// Web search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of result pages requested per run
    pub max_pages: usize,
    /// Offset step between result pages
    pub results_per_page: usize,
    /// Recency filter passed to the provider (`qdr:d3` = past 72 hours)
    pub recency: String,
    /// Search endpoint
    pub base_url: String,
}

/// Summarize-and-rank settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub top_rank_count: usize,
    /// Upper bound on in-flight page fetches
    pub concurrency: usize,
    pub fetch_timeout_secs: u64,
    /// Page text beyond this many characters is not sent to the LLM
    pub max_page_chars: usize,
}

/// Email delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub recipient: String,
    /// OAuth token file for the Gmail sender
    pub token_path: PathBuf,
    /// Google OAuth client downloaded from the Cloud console, read by `jobscout auth`
    pub client_secret_path: PathBuf,
}

/// API keys configuration (loaded from environment)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub gemini_key: Option<String>,
    #[serde(default)]
    pub serpapi_key: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub prompts: Prompts,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Validated, run-scoped settings handed to the workflow.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub max_search_pages: NonZeroUsize,
    pub results_per_page: NonZeroUsize,
    pub recency: String,
    pub top_rank_count: NonZeroUsize,
    pub recipient_email: String,
    pub concurrency: NonZeroUsize,
    pub fetch_timeout: Duration,
    pub max_page_chars: NonZeroUsize,
}

impl Config {
    /// Load configuration from the default location (jobscout.toml in cwd or home).
    ///
    /// Falls back to built-in defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::read_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let local_config = PathBuf::from(CONFIG_FILE_NAME);
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::home_dir()
            .map(|home| home.join(".config").join("jobscout").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    /// Override keys and run knobs from an environment-style lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.api.gemini_key = Some(key);
        }
        if let Some(key) = lookup("SERPAPI_API_KEY") {
            self.api.serpapi_key = Some(key);
        }
        if let Some(value) = lookup("MAX_PAGES") {
            self.search.max_pages = parse_count("MAX_PAGES", &value)?;
        }
        if let Some(value) = lookup("TOP_RANK_COUNT") {
            self.ranking.top_rank_count = parse_count("TOP_RANK_COUNT", &value)?;
        }
        if let Some(email) = lookup("JOB_SEARCH_EMAIL") {
            self.email.recipient = email;
        }
        Ok(())
    }

    /// Get the API key for the configured provider
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        match self.agent.provider.as_str() {
            "gemini" => self
                .api
                .gemini_key
                .as_deref()
                .ok_or_else(|| ConfigError::MissingApiKey("gemini".to_string())),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }

    pub fn serpapi_key(&self) -> Result<&str, ConfigError> {
        self.api
            .serpapi_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingApiKey("serpapi".to_string()))
    }

    /// Validate the run knobs into a [`WorkflowConfig`].
    pub fn workflow_config(&self) -> Result<WorkflowConfig, ConfigError> {
        let non_zero = |key: &str, value: usize| {
            NonZeroUsize::new(value).ok_or_else(|| ConfigError::invalid(key, "must be at least 1"))
        };

        if self.email.recipient.trim().is_empty() {
            return Err(ConfigError::invalid("email.recipient", "must not be empty"));
        }
        if self.ranking.fetch_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "ranking.fetch_timeout_secs",
                "must be at least 1",
            ));
        }

        Ok(WorkflowConfig {
            max_search_pages: non_zero("search.max_pages", self.search.max_pages)?,
            results_per_page: non_zero("search.results_per_page", self.search.results_per_page)?,
            recency: self.search.recency.clone(),
            top_rank_count: non_zero("ranking.top_rank_count", self.ranking.top_rank_count)?,
            recipient_email: self.email.recipient.clone(),
            concurrency: non_zero("ranking.concurrency", self.ranking.concurrency)?,
            fetch_timeout: Duration::from_secs(self.ranking.fetch_timeout_secs),
            max_page_chars: non_zero("ranking.max_page_chars", self.ranking.max_page_chars)?,
        })
    }

    /// Render the effective configuration as TOML with API keys masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        let mask = |key: &mut Option<String>| {
            if key.is_some() {
                *key = Some("********".to_string());
            }
        };
        mask(&mut shown.api.gemini_key);
        mask(&mut shown.api.serpapi_key);
        Ok(toml::to_string_pretty(&shown)?)
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, format!("{value:?} is not a count ({e})")))
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_pages: 2,
            results_per_page: 10,
            recency: "qdr:d3".to_string(),
            base_url: "https://serpapi.com/search.json".to_string(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_rank_count: 5,
            concurrency: 4,
            fetch_timeout_secs: 30,
            max_page_chars: 20_000,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            recipient: "example@example.com".to_string(),
            token_path: PathBuf::from("token.json"),
            client_secret_path: PathBuf::from("credentials.json"),
        }
    }
}
