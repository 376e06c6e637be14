//! Runtime configuration
//!
//! Values come from an optional JSON file and are then overridden by
//! `SPDCK_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::DEFAULT_CACHE_CAPACITY;

pub const DEFAULT_CONFIG_FILE: &str = "spdck.json";

const SPOTIFY_API_ENDPOINT: &str = "https://api.spotify.com/v1";
const SPOTIFY_TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";
const SPOTIFY_CLIENT_ID: &str = "39419929d0af4ecd9823ddaf925da504";
const HANDSHAKE_PEER: &str = "http://localhost:49983";
const CREDENTIAL_FILE: &str = ".cache/refresh_token";
const LOG_DIR: &str = ".logs";

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub api_endpoint: String,
    pub token_endpoint: String,
    pub client_id: String,
    pub handshake_peer: String,
    /// Shared secret presented to the handshake peer
    pub access_key: Option<String>,
    pub poll_interval_ms: u64,
    /// Faster cadence for UIs that render sub-second progress
    pub progress_poll_interval_ms: u64,
    /// Poll at the progress cadence instead of the default one
    pub progress_feedback: bool,
    pub handshake_timeout_ms: u64,
    pub cache_capacity: usize,
    pub credential_file: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: SPOTIFY_API_ENDPOINT.to_string(),
            token_endpoint: SPOTIFY_TOKEN_ENDPOINT.to_string(),
            client_id: SPOTIFY_CLIENT_ID.to_string(),
            handshake_peer: HANDSHAKE_PEER.to_string(),
            access_key: None,
            poll_interval_ms: 500,
            progress_poll_interval_ms: 250,
            progress_feedback: false,
            handshake_timeout_ms: 60_000,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            credential_file: PathBuf::from(CREDENTIAL_FILE),
            log_dir: PathBuf::from(LOG_DIR),
        }
    }
}

impl Config {
    /// Load the file at `path` if it exists, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            Config::default()
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `SPDCK_*` overrides resolved through `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SPDCK_API_ENDPOINT") {
            self.api_endpoint = v;
        }
        if let Some(v) = lookup("SPDCK_TOKEN_ENDPOINT") {
            self.token_endpoint = v;
        }
        if let Some(v) = lookup("SPDCK_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = lookup("SPDCK_HANDSHAKE_PEER") {
            self.handshake_peer = v;
        }
        if let Some(v) = lookup("SPDCK_ACCESS_KEY") {
            self.access_key = Some(v);
        }
        if let Some(v) = lookup("SPDCK_POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_override("SPDCK_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("SPDCK_PROGRESS_POLL_INTERVAL_MS") {
            self.progress_poll_interval_ms = parse_override("SPDCK_PROGRESS_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("SPDCK_PROGRESS_FEEDBACK") {
            self.progress_feedback = parse_override("SPDCK_PROGRESS_FEEDBACK", &v)?;
        }
        self.api_endpoint = self.api_endpoint.trim_end_matches('/').to_string();
        self.handshake_peer = self.handshake_peer.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_interval_ms)
    }

    /// Cadence the polling loop runs at
    pub fn active_poll_interval(&self) -> Duration {
        if self.progress_feedback {
            self.progress_poll_interval()
        } else {
            self.poll_interval()
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Redirect target registered with the authorization server
    pub fn redirect_uri(&self) -> String {
        format!("{}/callback", self.handshake_peer)
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} has an invalid value: {value}"))
}
