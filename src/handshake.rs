//! Client side of the one-time login handshake with the local companion peer
//!
//! The peer serves the browser redirect and the OAuth callback. This module only
//! waits for it to come up and collects the authorization code plus the PKCE
//! verifier once the user has approved access.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, Result};
use crate::http::{HttpRequest, HttpTransport};

pub const ACCESS_KEY_HEADER: &str = "X-SPDCK-ACCESS-KEY";
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);
pub const ACCESS_CODE_INTERVAL: Duration = Duration::from_millis(1000);

const ACCESS_KEY_LENGTH: usize = 32;
const ACCESS_KEY_CHARSET: &[u8] = b"abcdefghjkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Authorization code and the PKCE verifier it is bound to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub code_verifier: String,
}

#[derive(Debug, Deserialize)]
struct Heartbeat {
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AccessCodeReply {
    error: Option<String>,
    access_code: Option<String>,
    code_challenge: Option<String>,
}

/// Random shared secret guarding the peer's `/access_code` route
pub fn generate_access_key() -> String {
    let mut rng = rand::rng();
    (0..ACCESS_KEY_LENGTH)
        .map(|_| ACCESS_KEY_CHARSET[rng.random_range(0..ACCESS_KEY_CHARSET.len())] as char)
        .collect()
}

pub struct HandshakePeer {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl HandshakePeer {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Page the user opens to start the authorization flow
    pub fn login_url(&self) -> String {
        format!("{}/", self.base_url)
    }

    pub async fn is_online(&self) -> bool {
        let request = HttpRequest::get(format!("{}/heartbeat", self.base_url));
        match self.transport.send(request).await {
            Ok(response) => serde_json::from_str::<Heartbeat>(&response.body)
                .map(|beat| beat.status.as_deref() == Some("ok"))
                .unwrap_or(false),
            Err(e) => {
                tracing::trace!(error = %e, "Handshake peer heartbeat failed");
                false
            }
        }
    }

    /// Re-check the heartbeat every 500 ms until the peer answers.
    /// Resolves `false` on timeout or cancellation.
    pub async fn wait_until_online(&self, timeout: Option<Duration>, cancel: &CancellationToken) -> bool {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            if cancel.is_cancelled() {
                tracing::debug!("Waiting for handshake peer cancelled");
                return false;
            }
            if self.is_online().await {
                tracing::info!(peer = %self.base_url, "Handshake peer is online");
                return true;
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = tokio::time::Instant::now();
                    if now >= deadline {
                        tracing::warn!(peer = %self.base_url, "Timed out waiting for handshake peer");
                        return false;
                    }
                    HEARTBEAT_INTERVAL.min(deadline - now)
                }
                None => HEARTBEAT_INTERVAL,
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Waiting for handshake peer cancelled");
                    return false;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Long-poll `/access_code` until the peer knows both the authorization code
    /// and the PKCE verifier
    pub async fn await_authorization(
        &self,
        access_key: &str,
        cancel: &CancellationToken,
    ) -> Result<AuthorizationGrant> {
        let mut code: Option<String> = None;
        let mut verifier: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Handshake("cancelled".to_string()));
            }

            let request = HttpRequest::get(format!("{}/access_code", self.base_url))
                .header("Content-Type", "application/json")
                .header(ACCESS_KEY_HEADER, access_key);
            match self.transport.send(request).await {
                Ok(response) => {
                    let reply: AccessCodeReply = serde_json::from_str(&response.body).unwrap_or_default();
                    if let Some(error) = reply.error {
                        tracing::error!(error = %error, "Handshake peer reported an error");
                        return Err(ApiError::Handshake(error));
                    }
                    if let Some(c) = reply.access_code.filter(|c| !c.is_empty()) {
                        code = Some(c);
                    }
                    if let Some(v) = reply.code_challenge.filter(|v| !v.is_empty()) {
                        verifier = Some(v);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Polling handshake peer failed"),
            }

            if let (Some(code), Some(code_verifier)) = (&code, &verifier) {
                tracing::info!("Authorization code received from handshake peer");
                return Ok(AuthorizationGrant {
                    code: code.clone(),
                    code_verifier: code_verifier.clone(),
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Handshake("cancelled".to_string())),
                _ = tokio::time::sleep(ACCESS_CODE_INTERVAL) => {}
            }
        }
    }
}
