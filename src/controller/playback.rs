//! Playback control methods

use crate::error::Result;
use crate::model::RepeatMode;

use super::PlaybackController;

/// Past this point "previous" restarts the current track instead
pub const RESTART_THRESHOLD_MS: u64 = 3000;

impl PlaybackController {
    pub async fn toggle_playback(&self) -> Result<()> {
        let is_playing = self.observed.lock().await.is_playing();
        tracing::debug!(is_playing, "Toggling playback");

        let result = if is_playing {
            self.client.pause().await
        } else {
            self.client.play().await
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Toggle playback failed");
            return Err(e);
        }
        tracing::info!(action = if is_playing { "paused" } else { "resumed" }, "Playback toggled");
        self.refresh().await;
        Ok(())
    }

    pub async fn next_track(&self) -> Result<()> {
        tracing::debug!("Skipping to next track");
        if let Err(e) = self.client.next_track().await {
            tracing::error!(error = %e, "Next track failed");
            return Err(e);
        }
        tracing::info!("Skipped to next track");
        self.refresh().await;
        Ok(())
    }

    /// Restart the track when past the threshold, otherwise go back one
    pub async fn previous_track(&self) -> Result<()> {
        let position_ms = self.observed.lock().await.position_ms();
        let result = if position_ms > RESTART_THRESHOLD_MS {
            tracing::debug!(position_ms, "Restarting current track");
            self.client.seek(0).await
        } else {
            tracing::debug!(position_ms, "Going to previous track");
            self.client.previous_track().await
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Previous track failed");
            return Err(e);
        }
        self.refresh().await;
        Ok(())
    }

    pub async fn toggle_shuffle(&self) -> Result<()> {
        let shuffle = !self.observed.lock().await.shuffle();
        if let Err(e) = self.client.set_shuffle(shuffle).await {
            tracing::error!(error = %e, "Toggle shuffle failed");
            return Err(e);
        }
        tracing::info!(shuffle, "Shuffle toggled");
        Ok(())
    }

    /// Switch between repeat off and repeat context
    pub async fn toggle_repeat(&self) -> Result<()> {
        let mode = if self.observed.lock().await.repeat_mode().is_enabled() {
            RepeatMode::Off
        } else {
            RepeatMode::Context
        };
        if let Err(e) = self.client.set_repeat(mode).await {
            tracing::error!(error = %e, "Toggle repeat failed");
            return Err(e);
        }
        tracing::info!(repeat = %mode, "Repeat toggled");
        Ok(())
    }

    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        if let Err(e) = self.client.set_volume(volume).await {
            tracing::error!(error = %e, volume, "Set volume failed");
            return Err(e);
        }
        self.refresh().await;
        Ok(())
    }

    /// Reconcile right away so listeners see the effect of a command
    async fn refresh(&self) {
        if let Err(e) = self.poll(false).await {
            tracing::warn!(error = %e, "Refresh after command failed");
        }
    }
}
