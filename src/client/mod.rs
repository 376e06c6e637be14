//! Spotify Web API client
//!
//! - `executor`: authenticated request execution with 401/429 recovery
//! - `commands`: playback snapshot, transport commands and track metadata

mod executor;
mod commands;

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::auth::{TokenManager, TokenPair};
use crate::config::Config;
use crate::error::Result;
use crate::http::HttpTransport;
use crate::model::{event_channel, EventSender, PlaybackEvent, TrackCache};

pub use executor::{ApiResponse, MAX_TOKEN_ATTEMPTS, MAX_UNAUTHORIZED_RETRIES};

/// Explicit client handle; clones share credentials, cache and event channel
#[derive(Clone)]
pub struct SpotifyClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenManager>,
    cache: TrackCache,
    events: EventSender,
    api_endpoint: Arc<str>,
}

impl SpotifyClient {
    pub fn new(config: &Config, transport: Arc<dyn HttpTransport>, credentials: TokenPair) -> Result<Self> {
        let events = event_channel();
        let tokens = TokenManager::new(
            transport.clone(),
            config.token_endpoint.clone(),
            config.client_id.clone(),
            credentials,
            events.clone(),
        )?;

        Ok(Self {
            transport,
            tokens: Arc::new(tokens),
            cache: TrackCache::new(config.cache_capacity),
            events,
            api_endpoint: Arc::from(config.api_endpoint.trim_end_matches('/')),
        })
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn cache(&self) -> &TrackCache {
        &self.cache
    }

    /// New receiver for every event raised from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: PlaybackEvent) {
        tracing::trace!(event = event.name(), "Emitting event");
        // No subscribers is fine; UI bindings may attach later.
        let _ = self.events.send(event);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_endpoint, path)
    }
}
