//! One reconciliation cycle: fetch the snapshot, diff every facet, emit changes

use chrono::Utc;

use crate::error::Result;
use crate::model::{normalize_volume, ObservedState, PlaybackEvent, PlaybackSnapshot};

use super::PlaybackController;

impl PlaybackController {
    /// Fetch the current snapshot and emit one event per changed facet, or
    /// every facet when `force_emit_all` is set. Progress is emitted on every
    /// successful poll.
    pub async fn poll(&self, force_emit_all: bool) -> Result<()> {
        // Holding the lock for the whole cycle keeps cycles strictly sequential.
        let mut observed = self.observed.lock().await;

        match self.client.playback_state().await? {
            None => {
                tracing::debug!("Playback cleared");
                observed.reset();
                observed.synced_at = Some(Utc::now());
                self.client.emit(PlaybackEvent::PlaybackCleared);
            }
            Some(snapshot) => {
                self.reconcile(&mut observed, snapshot, force_emit_all).await?;
            }
        }
        Ok(())
    }

    async fn reconcile(
        &self,
        observed: &mut ObservedState,
        snapshot: PlaybackSnapshot,
        force: bool,
    ) -> Result<()> {
        if let Some(item) = &snapshot.item {
            if let Some(track_id) = snapshot.track_id().filter(|id| !id.is_empty()) {
                if force || observed.track_id.as_deref() != Some(track_id) {
                    observed.track_id = Some(track_id.to_string());
                    self.client.cache_track(item).await;
                    let track = self.client.track_information(track_id).await?;
                    tracing::info!(
                        track = %track.name,
                        artist = %track.artist_line(),
                        track_id,
                        "Track changed"
                    );
                    self.client.emit(PlaybackEvent::TrackChanged(track));
                }
            }
        }

        if force || observed.repeat != Some(snapshot.repeat_state) {
            observed.repeat = Some(snapshot.repeat_state);
            tracing::debug!(repeat = %snapshot.repeat_state, "Repeat mode changed");
            self.client.emit(PlaybackEvent::RepeatModeChanged(snapshot.repeat_state));
        }

        if force || observed.shuffle != Some(snapshot.shuffle_state) {
            observed.shuffle = Some(snapshot.shuffle_state);
            tracing::debug!(shuffle = snapshot.shuffle_state, "Shuffle mode changed");
            self.client.emit(PlaybackEvent::ShuffleModeChanged(snapshot.shuffle_state));
        }

        if force || observed.playing != Some(snapshot.is_playing) {
            observed.playing = Some(snapshot.is_playing);
            tracing::debug!(playing = snapshot.is_playing, "Playback state changed");
            self.client.emit(PlaybackEvent::PlaybackStateChanged {
                playing: snapshot.is_playing,
            });
        }

        if let Some(percent) = snapshot.volume_percent() {
            if force || observed.volume_percent != Some(percent) {
                observed.volume_percent = Some(percent);
                tracing::debug!(percent, "Volume changed");
                self.client.emit(PlaybackEvent::VolumeChanged(normalize_volume(percent)));
            }
        }

        let position_ms = snapshot.progress_ms.unwrap_or(0);
        observed.position_ms = position_ms;
        observed.synced_at = Some(Utc::now());
        self.client.emit(PlaybackEvent::ProgressTick {
            position_ms,
            duration_ms: snapshot.duration_ms(),
        });
        Ok(())
    }
}
