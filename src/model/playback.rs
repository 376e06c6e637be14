//! Playback snapshot, track metadata and the reconciler's observed state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{DeviceInfo, RepeatMode};

/// Volume reported by the accessors before any device volume was observed
pub const DEFAULT_VOLUME_PERCENT: u8 = 100;

const FALLBACK_BACKLINK: &str = "https://www.spotify.com/";

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Artist {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Album {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

/// Metadata about a track, as embedded in a snapshot or returned by `/tracks/{id}`
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Track {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album: Album,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub duration_ms: u64,
}

impl Track {
    /// URL of the tallest album image
    pub fn artwork_url(&self) -> Option<&str> {
        self.album
            .images
            .iter()
            .max_by_key(|image| image.height.unwrap_or(0))
            .map(|image| image.url.as_str())
    }

    /// Artist names joined for display
    pub fn artist_line(&self) -> String {
        if self.artists.is_empty() {
            return "N / A".to_string();
        }
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn external_link(&self) -> &str {
        self.external_urls
            .spotify
            .as_deref()
            .filter(|link| !link.is_empty())
            .unwrap_or(FALLBACK_BACKLINK)
    }
}

/// One read of `GET /me/player`
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct PlaybackSnapshot {
    pub item: Option<Track>,
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub repeat_state: RepeatMode,
    #[serde(default)]
    pub shuffle_state: bool,
    #[serde(default)]
    pub is_playing: bool,
    pub device: Option<DeviceInfo>,
}

impl PlaybackSnapshot {
    /// Identifier of the active track, when the item carries one
    pub fn track_id(&self) -> Option<&str> {
        self.item.as_ref().and_then(|item| item.id.as_deref())
    }

    pub fn volume_percent(&self) -> Option<u8> {
        self.device
            .as_ref()
            .and_then(|device| device.volume_percent)
            .map(|v| v.min(100))
    }

    pub fn duration_ms(&self) -> u64 {
        self.item.as_ref().map(|item| item.duration_ms).unwrap_or(0)
    }
}

/// Normalize a device volume percent to the 0..=1 range
pub fn normalize_volume(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

/// Last emitted value of every facet.
///
/// `None` means nothing was emitted since construction or the last clear, so the
/// next present snapshot reports that facet as changed. The accessors fold
/// `None` into the documented defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservedState {
    pub(crate) track_id: Option<String>,
    pub(crate) repeat: Option<RepeatMode>,
    pub(crate) shuffle: Option<bool>,
    pub(crate) playing: Option<bool>,
    pub(crate) volume_percent: Option<u8>,
    pub(crate) position_ms: u64,
    pub(crate) synced_at: Option<DateTime<Utc>>,
}

impl ObservedState {
    pub fn reset(&mut self) {
        let synced_at = self.synced_at;
        *self = Self::default();
        self.synced_at = synced_at;
    }

    pub fn track_id(&self) -> Option<&str> {
        self.track_id.as_deref()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat.unwrap_or_default()
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle.unwrap_or(false)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.unwrap_or(false)
    }

    pub fn volume(&self) -> f32 {
        normalize_volume(self.volume_percent.unwrap_or(DEFAULT_VOLUME_PERCENT))
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    /// Time of the last successful poll; stale when polls keep failing
    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_snapshot_json() -> serde_json::Value {
        json!({
            "device": { "id": "d1", "is_active": true, "name": "Deck", "type": "Computer", "volume_percent": 64 },
            "shuffle_state": true,
            "repeat_state": "track",
            "progress_ms": 42000,
            "is_playing": true,
            "currently_playing_type": "track",
            "item": {
                "id": "T1",
                "name": "Song",
                "duration_ms": 180000,
                "artists": [{ "name": "A" }, { "name": "B" }],
                "album": {
                    "name": "Record",
                    "images": [
                        { "url": "small", "height": 64, "width": 64 },
                        { "url": "large", "height": 640, "width": 640 },
                        { "url": "medium", "height": 300, "width": 300 }
                    ]
                },
                "external_urls": { "spotify": "https://open.spotify.com/track/T1" }
            }
        })
    }

    #[test]
    fn test_snapshot_parses_web_api_shape() {
        let snapshot: PlaybackSnapshot = serde_json::from_value(sample_snapshot_json()).unwrap();
        assert_eq!(snapshot.track_id(), Some("T1"));
        assert_eq!(snapshot.repeat_state, RepeatMode::Track);
        assert!(snapshot.shuffle_state);
        assert!(snapshot.is_playing);
        assert_eq!(snapshot.volume_percent(), Some(64));
        assert_eq!(snapshot.progress_ms, Some(42000));
        assert_eq!(snapshot.duration_ms(), 180000);
    }

    #[test]
    fn test_snapshot_tolerates_missing_facets() {
        let snapshot: PlaybackSnapshot = serde_json::from_value(json!({ "is_playing": false })).unwrap();
        assert_eq!(snapshot.track_id(), None);
        assert_eq!(snapshot.repeat_state, RepeatMode::Off);
        assert_eq!(snapshot.volume_percent(), None);
        assert_eq!(snapshot.duration_ms(), 0);
    }

    #[test]
    fn test_track_display_helpers() {
        let snapshot: PlaybackSnapshot = serde_json::from_value(sample_snapshot_json()).unwrap();
        let track = snapshot.item.unwrap();
        assert_eq!(track.artwork_url(), Some("large"));
        assert_eq!(track.artist_line(), "A, B");
        assert_eq!(track.external_link(), "https://open.spotify.com/track/T1");

        let bare = Track::default();
        assert_eq!(bare.artwork_url(), None);
        assert_eq!(bare.artist_line(), "N / A");
        assert_eq!(bare.external_link(), FALLBACK_BACKLINK);
    }

    #[test]
    fn test_volume_normalization_bounds() {
        assert_eq!(normalize_volume(0), 0.0);
        assert_eq!(normalize_volume(50), 0.5);
        assert_eq!(normalize_volume(100), 1.0);
        assert_eq!(normalize_volume(250), 1.0);
    }

    #[test]
    fn test_observed_state_defaults_after_reset() {
        let mut state = ObservedState {
            track_id: Some("T1".into()),
            repeat: Some(RepeatMode::Context),
            shuffle: Some(true),
            playing: Some(true),
            volume_percent: Some(30),
            position_ms: 1000,
            synced_at: Some(Utc::now()),
        };
        state.reset();
        assert_eq!(state.track_id(), None);
        assert_eq!(state.repeat_mode(), RepeatMode::Off);
        assert!(!state.shuffle());
        assert!(!state.is_playing());
        assert_eq!(state.volume(), 1.0);
        assert_eq!(state.position_ms(), 0);
        assert!(state.synced_at().is_some());
    }
}
