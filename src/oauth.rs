//! One-time Gmail consent using the installed-app loopback flow.
//!
//! The user approves the `gmail.send` scope in a browser, Google redirects to a
//! short-lived listener on 127.0.0.1, and the returned code is exchanged for a
//! refresh token. The result is a [`StoredToken`] that
//! [`GmailMailer`](crate::mailer::GmailMailer) keeps refreshing afterwards.

use crate::mailer::{expiry_after, MailError, StoredToken};
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("failed to read client secrets {path}: {reason}")]
    ClientSecrets { path: PathBuf, reason: String },
    #[error("invalid auth_uri {0}")]
    InvalidAuthUri(String),
    #[error("loopback listener failed: {0}")]
    Listener(#[from] std::io::Error),
    #[error("authorization was denied: {0}")]
    Denied(String),
    #[error("unexpected authorization callback: {0}")]
    BadCallback(String),
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error(transparent)]
    Token(#[from] MailError),
}

/// The `installed` (or `web`) block of a Google `client_secret_*.json` download
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ClientSecrets {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let to_error = |reason: String| AuthError::ClientSecrets {
            path: path.to_path_buf(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| to_error(e.to_string()))?;
        let file: ClientSecretsFile =
            serde_json::from_str(&content).map_err(|e| to_error(e.to_string()))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| to_error("expected an \"installed\" or \"web\" client".to_string()))
    }

    /// Consent page URL for the send scope, asking for offline access
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &self.auth_uri,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", GMAIL_SEND_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::InvalidAuthUri(format!("{}: {e}", self.auth_uri)))
    }
}

#[derive(Debug, Deserialize)]
struct CodeExchangeResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

pub struct ConsentFlow {
    client: Client,
    secrets: ClientSecrets,
}

/// A bound loopback listener waiting for the browser to come back
pub struct PendingConsent {
    listener: TcpListener,
    redirect_uri: String,
    state: String,
    url: Url,
}

impl PendingConsent {
    /// Where the user has to go to approve access
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl ConsentFlow {
    pub fn new(secrets: ClientSecrets) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Exchange(e.to_string()))?;
        Ok(Self { client, secrets })
    }

    /// Bind the redirect listener on an ephemeral port
    pub async fn start(&self) -> Result<PendingConsent, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let state = Uuid::new_v4().simple().to_string();
        let url = self.secrets.authorization_url(&redirect_uri, &state)?;
        debug!(%redirect_uri, "waiting for consent redirect");
        Ok(PendingConsent {
            listener,
            redirect_uri,
            state,
            url,
        })
    }

    /// Wait for the redirect, then trade its code for a token
    pub async fn finish(&self, pending: PendingConsent) -> Result<StoredToken, AuthError> {
        let code = wait_for_code(&pending.listener, &pending.state).await?;
        info!("authorization code received");
        self.exchange_code(&code, &pending.redirect_uri).await
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<StoredToken, AuthError> {
        let response = self
            .client
            .post(&self.secrets.token_uri)
            .form(&[
                ("code", code),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Exchange(format!("{status}: {body}")));
        }

        let granted: CodeExchangeResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;
        let refresh_token = granted.refresh_token.ok_or_else(|| {
            AuthError::Exchange("no refresh_token in response; revoke the app's access and retry".to_string())
        })?;
        let expires_at = granted
            .expires_in
            .map(|secs| expiry_after(Utc::now(), secs))
            .transpose()?;
        let scopes = match granted.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => vec![GMAIL_SEND_SCOPE.to_string()],
        };

        Ok(StoredToken {
            access_token: Some(granted.access_token),
            refresh_token,
            client_id: self.secrets.client_id.clone(),
            client_secret: self.secrets.client_secret.clone(),
            token_uri: self.secrets.token_uri.clone(),
            scopes,
            expires_at,
        })
    }
}

/// Serve requests until the consent redirect arrives
async fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let (target, mut stream) = read_request_target(stream).await?;
        let Some(query) = callback_query(&target) else {
            debug!(%peer, %target, "ignoring non-callback request");
            respond(&mut stream, "404 Not Found", "Not found").await?;
            continue;
        };

        let outcome = parse_callback(&query, expected_state);
        let page = match &outcome {
            Ok(_) => "jobscout is authorized. You can close this tab.",
            Err(_) => "Authorization failed. Check the terminal for details.",
        };
        if let Err(e) = respond(&mut stream, "200 OK", page).await {
            warn!(error = %e, "failed to answer the browser");
        }
        return outcome;
    }
}

/// Request target of the first line, with the headers drained
async fn read_request_target(stream: TcpStream) -> Result<(String, TcpStream), AuthError> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut header = String::new();
    loop {
        header.clear();
        if reader.read_line(&mut header).await? == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }

    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();
    Ok((target, reader.into_inner()))
}

/// Query pairs of a request for the redirect path, `None` for anything else
fn callback_query(target: &str) -> Option<HashMap<String, String>> {
    let url = Url::parse("http://127.0.0.1").ok()?.join(target).ok()?;
    if url.path() != "/" {
        return None;
    }
    Some(url.query_pairs().into_owned().collect())
}

fn parse_callback(query: &HashMap<String, String>, expected_state: &str) -> Result<String, AuthError> {
    if let Some(error) = query.get("error") {
        return Err(AuthError::Denied(error.clone()));
    }
    if query.get("state").map(String::as_str) != Some(expected_state) {
        return Err(AuthError::BadCallback("state does not match".to_string()));
    }
    query
        .get("code")
        .cloned()
        .ok_or_else(|| AuthError::BadCallback("no code parameter".to_string()))
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
