//! Email delivery of the ranked postings.
//!
//! [`GmailMailer`] sends through the Gmail API using a stored OAuth token that
//! is refreshed silently when it expires. The token file uses the same layout
//! as Google's authorized-user JSON (`token`, `refresh_token`, `client_id`,
//! `client_secret`, `token_uri`, `expiry`). `jobscout auth` writes it (see
//! [`crate::oauth`]), and a file from any standard installed-app flow works too.

use crate::summary::RankedPost;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use colored::Colorize;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const SUBJECT_LABEL: &str = "Job Search Results";
const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("no OAuth token at {0}; run `jobscout auth` once to create it")]
    MissingToken(PathBuf),
    #[error("failed to read token file {path}: {reason}")]
    TokenFile { path: PathBuf, reason: String },
    #[error("failed to refresh access token: {0}")]
    TokenRefresh(String),
    #[error("mail request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("mail provider returned {status}: {body}")]
    SendFailed { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Subject line for a run on `date`
pub fn compose_subject(date: NaiveDate) -> String {
    format!("{SUBJECT_LABEL}: {}", date.format("%Y-%m-%d"))
}

/// One block per post, in ranked order, separated by a blank line
pub fn compose_body(posts: &[RankedPost]) -> String {
    posts
        .iter()
        .map(RankedPost::email_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Persisted OAuth credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(rename = "token", default)]
    pub access_token: Option<String>,
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(rename = "expiry", default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl StoredToken {
    pub fn load(path: &Path) -> Result<Self, MailError> {
        if !path.exists() {
            return Err(MailError::MissingToken(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| MailError::TokenFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| MailError::TokenFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), MailError> {
        let to_file_error = |reason: String| MailError::TokenFile {
            path: path.to_path_buf(),
            reason,
        };
        let content = serde_json::to_string_pretty(self).map_err(|e| to_file_error(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| to_file_error(e.to_string()))
    }

    /// A usable access token, if one is cached and not about to expire
    pub fn valid_access_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        match self.expires_at {
            Some(expiry) if expiry.checked_sub_signed(expiry_margin()).is_some_and(|at| at > now) => {
                Some(token)
            }
            _ => None,
        }
    }
}

fn expiry_margin() -> chrono::Duration {
    chrono::Duration::seconds(EXPIRY_MARGIN_SECS)
}

/// The instant a token issued at `now` with a lifetime of `expires_in` seconds lapses
pub(crate) fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, MailError> {
    chrono::Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| MailError::TokenRefresh(format!("unusable expires_in of {expires_in} seconds")))
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Gmail API sender
pub struct GmailMailer {
    client: Client,
    token_path: PathBuf,
    api_base: String,
}

impl GmailMailer {
    pub fn new(token_path: impl Into<PathBuf>) -> Result<Self, MailError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            token_path: token_path.into(),
            api_base: GMAIL_API_BASE.to_string(),
        })
    }

    /// Point the sender at a different API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Load the stored token, refreshing and persisting it when stale
    async fn access_token(&self) -> Result<String, MailError> {
        let mut stored = StoredToken::load(&self.token_path)?;
        let now = Utc::now();
        if let Some(token) = stored.valid_access_token(now) {
            return Ok(token.to_string());
        }

        debug!(token_uri = %stored.token_uri, "refreshing Gmail access token");
        let response = self
            .client
            .post(&stored.token_uri)
            .form(&[
                ("client_id", stored.client_id.as_str()),
                ("client_secret", stored.client_secret.as_str()),
                ("refresh_token", stored.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| MailError::TokenRefresh(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::TokenRefresh(format!("{status}: {body}")));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| MailError::TokenRefresh(e.to_string()))?;

        stored.expires_at = refreshed
            .expires_in
            .map(|secs| expiry_after(now, secs))
            .transpose()?;
        stored.access_token = Some(refreshed.access_token.clone());
        stored.save(&self.token_path)?;

        Ok(refreshed.access_token)
    }
}

#[async_trait]
impl Mailer for GmailMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let token = self.access_token().await?;
        let raw = URL_SAFE.encode(build_message(to, subject, body));

        let response = self
            .client
            .post(format!("{}/gmail/v1/users/me/messages/send", self.api_base))
            .bearer_auth(token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::SendFailed { status, body });
        }

        info!(%to, %subject, "email sent");
        Ok(())
    }
}

/// RFC 822 plain-text message; Gmail fills in the sender
fn build_message(to: &str, subject: &str, body: &str) -> String {
    format!(
        "To: {to}\r\nSubject: {subject}\r\nMIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=\"UTF-8\"\r\n\
         Content-Transfer-Encoding: 8bit\r\n\r\n{body}"
    )
}

/// Prints the email instead of sending it
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        println!("{} {}", "To:".bold(), to);
        println!("{} {}\n", "Subject:".bold(), subject);
        if body.is_empty() {
            println!("{}", "(no matching postings)".dimmed());
        } else {
            println!("{body}");
        }
        Ok(())
    }
}
