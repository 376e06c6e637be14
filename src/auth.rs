//! Credential handling: refresh-token exchange, authorization-code exchange and
//! refresh-token persistence

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use tokio::sync::{watch, Mutex, RwLock};

use crate::error::{ApiError, Result};
use crate::handshake::AuthorizationGrant;
use crate::http::{HttpRequest, HttpTransport};
use crate::model::{EventSender, PlaybackEvent};

/// Access/refresh credential pair handed to the client at construction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: Option<String>,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: None,
            refresh_token: refresh_token.into(),
        }
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        let token: String = access_token.into();
        self.access_token = Some(token).filter(|t| !t.is_empty());
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    /// Classify a token endpoint reply. Only an OAuth `error` answer means the
    /// credential itself was refused; outages keep their HTTP classification.
    fn parse(status: u16, body: &str) -> Result<Self> {
        if status >= 500 {
            tracing::warn!(status, "Token endpoint unavailable");
            return Err(ApiError::Server);
        }
        let parsed = serde_json::from_str::<TokenResponse>(body);
        if let Ok(response) = &parsed {
            if let Some(error) = &response.error {
                let detail = response.error_description.as_deref().unwrap_or(error);
                return Err(ApiError::Auth(format!("token endpoint rejected the exchange: {detail}")));
            }
        }
        if !(200..300).contains(&status) {
            return Err(ApiError::UnexpectedStatus(status));
        }
        Ok(parsed?)
    }
}

/// Holds the credential pair and exchanges the refresh credential on demand
pub struct TokenManager {
    transport: Arc<dyn HttpTransport>,
    token_endpoint: String,
    client_id: String,
    access_token: RwLock<Option<String>>,
    // Latest refresh credential; receivers always see the newest rotation.
    refresh_token: watch::Sender<String>,
    exchange_lock: Mutex<()>,
    events: EventSender,
}

impl TokenManager {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        credentials: TokenPair,
        events: EventSender,
    ) -> Result<Self> {
        if credentials.refresh_token.is_empty() {
            return Err(ApiError::Auth("No refresh token specified".to_string()));
        }
        Ok(Self {
            transport,
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            access_token: RwLock::new(credentials.access_token.filter(|t| !t.is_empty())),
            refresh_token: watch::channel(credentials.refresh_token).0,
            exchange_lock: Mutex::new(()),
            events,
        })
    }

    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    pub async fn refresh_token(&self) -> String {
        self.refresh_token.borrow().clone()
    }

    /// Receiver that is marked changed on every rotation. Unlike the event
    /// channel it cannot lag: it always holds the newest refresh credential.
    pub fn subscribe_refresh_token(&self) -> watch::Receiver<String> {
        self.refresh_token.subscribe()
    }

    /// Drop the held access credential so the next call re-exchanges
    pub async fn invalidate(&self) {
        tracing::debug!("Invalidating access token");
        *self.access_token.write().await = None;
    }

    /// Return the held access credential or exchange the refresh credential for a new one
    pub async fn ensure_access_token(&self) -> Result<String> {
        if let Some(token) = self.access_token().await {
            return Ok(token);
        }

        let _guard = self.exchange_lock.lock().await;
        // Another caller may have finished the exchange while we waited.
        if let Some(token) = self.access_token().await {
            return Ok(token);
        }

        let refresh_token = self.refresh_token().await;
        if refresh_token.is_empty() {
            return Err(ApiError::Auth("No refresh token specified".to_string()));
        }

        tracing::debug!("Exchanging refresh token for a new access token");
        let request = HttpRequest::new(Method::POST, &self.token_endpoint).form([
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ]);
        let response = self.transport.send(request).await?;
        let tokens = TokenResponse::parse(response.status, &response.body)?;

        let access_token = tokens
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Auth("token endpoint returned no access token".to_string()))?;
        *self.access_token.write().await = Some(access_token.clone());

        if let Some(rotated) = tokens.refresh_token.filter(|t| !t.is_empty() && *t != refresh_token) {
            self.refresh_token.send_replace(rotated.clone());
            tracing::info!("Refresh token rotated");
            let _ = self.events.send(PlaybackEvent::CredentialRotated(rotated));
        }

        tracing::info!("Access token refreshed successfully");
        Ok(access_token)
    }
}

/// Exchange an authorization code and its PKCE verifier for a credential pair
pub async fn exchange_authorization_code(
    transport: &dyn HttpTransport,
    token_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    grant: &AuthorizationGrant,
) -> Result<TokenPair> {
    tracing::info!("Exchanging authorization code for tokens");
    let request = HttpRequest::new(Method::POST, token_endpoint).form([
        ("client_id", client_id),
        ("code", grant.code.as_str()),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
        ("code_verifier", grant.code_verifier.as_str()),
    ]);
    let response = transport.send(request).await?;
    let tokens = TokenResponse::parse(response.status, &response.body)?;

    let refresh_token = tokens
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Auth("token endpoint returned no refresh token".to_string()))?;
    let mut pair = TokenPair::new(refresh_token);
    if let Some(access_token) = tokens.access_token {
        pair = pair.with_access_token(access_token);
    }
    Ok(pair)
}

/// Persistence for the refresh credential
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<String>>;
    fn store(&self, refresh_token: &str) -> anyhow::Result<()>;
    fn remove(&self) -> anyhow::Result<()>;
}

/// Keeps the refresh credential in a single file
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> anyhow::Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let token = fs::read_to_string(&self.path)?;
        let token = token.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    fn store(&self, refresh_token: &str) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, refresh_token)?;
        tracing::debug!(path = %self.path.display(), "Saved refresh token to disk");
        Ok(())
    }

    fn remove(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            tracing::debug!(path = %self.path.display(), "Removed stored refresh token");
        }
        Ok(())
    }
}
