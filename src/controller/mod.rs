//! Controller module - keeps the observed playback state in sync with the service
//!
//! - `reconcile`: one poll cycle (fetch, diff, emit)
//! - `polling`: fixed-delay loop driving `reconcile`
//! - `playback`: transport commands followed by an immediate refresh

mod reconcile;
mod polling;
mod playback;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::{broadcast, Mutex};

use crate::client::SpotifyClient;
use crate::model::{ObservedState, PlaybackEvent};

/// Reconciles the local view of playback against the service
#[derive(Clone)]
pub struct PlaybackController {
    pub(crate) client: SpotifyClient,
    pub(crate) observed: Arc<Mutex<ObservedState>>,
    // Loop interval in milliseconds; zero means disabled.
    interval_ms: Arc<AtomicU64>,
    // Bumped whenever a new loop is spawned so a stale loop can tell it was replaced.
    generation: Arc<AtomicU64>,
}

impl PlaybackController {
    pub fn new(client: SpotifyClient) -> Self {
        Self {
            client,
            observed: Arc::new(Mutex::new(ObservedState::default())),
            interval_ms: Arc::new(AtomicU64::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn client(&self) -> &SpotifyClient {
        &self.client
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.client.subscribe()
    }

    /// Copy of the last emitted facet values
    pub async fn observed_state(&self) -> ObservedState {
        self.observed.lock().await.clone()
    }
}
