//! Playback snapshot, transport commands and track metadata lookup

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, Result};
use crate::model::{DeviceInfo, PlaybackSnapshot, RepeatMode, Track};

use super::SpotifyClient;

#[derive(Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<DeviceInfo>,
}

/// Interpret a volume that is either a 0..1 fraction or a 0..=100 percent
pub(crate) fn volume_percent(volume: f64) -> Result<u8> {
    if volume.is_nan() {
        return Err(ApiError::InvalidArgument("No volume specified".to_string()));
    }
    let percent = if volume > 0.0 && volume < 1.0 { volume * 100.0 } else { volume };
    if !(0.0..=100.0).contains(&percent) {
        return Err(ApiError::InvalidArgument(format!("volume out of range: {volume}")));
    }
    Ok(percent.floor() as u8)
}

impl SpotifyClient {
    /// Current playback snapshot; `None` when nothing is playing (204)
    pub async fn playback_state(&self) -> Result<Option<PlaybackSnapshot>> {
        let response = self.get("/me/player").await?;
        if response.is_no_content() || response.body.is_null() {
            tracing::trace!("Nothing is playing");
            return Ok(None);
        }
        let snapshot: PlaybackSnapshot = response.parse()?;
        tracing::trace!(
            is_playing = snapshot.is_playing,
            track_id = ?snapshot.track_id(),
            "Got playback state"
        );
        Ok(Some(snapshot))
    }

    pub async fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let list: DeviceList = self.get("/me/player/devices").await?.parse()?;
        tracing::debug!(count = list.devices.len(), "Found devices");
        Ok(list.devices)
    }

    pub async fn transfer_playback(&self, device_id: &str, play: bool) -> Result<bool> {
        if device_id.is_empty() {
            return Err(ApiError::InvalidArgument("No device id specified".to_string()));
        }
        tracing::debug!(device_id, play, "API: transfer_playback");
        let body = json!({ "device_ids": [device_id], "play": play });
        self.command("/me/player", Method::PUT, Some(body)).await
    }

    pub async fn play(&self) -> Result<bool> {
        tracing::debug!("API: resume_playback");
        self.command("/me/player/play", Method::PUT, None).await
    }

    pub async fn pause(&self) -> Result<bool> {
        tracing::debug!("API: pause_playback");
        self.command("/me/player/pause", Method::PUT, None).await
    }

    pub async fn next_track(&self) -> Result<bool> {
        tracing::debug!("API: next_track");
        self.command("/me/player/next", Method::POST, None).await
    }

    pub async fn previous_track(&self) -> Result<bool> {
        tracing::debug!("API: previous_track");
        self.command("/me/player/previous", Method::POST, None).await
    }

    pub async fn seek(&self, position_ms: u64) -> Result<bool> {
        tracing::debug!(position_ms, "API: seek");
        let path = format!("/me/player/seek?position_ms={position_ms}");
        self.command(&path, Method::PUT, Some(json!({}))).await
    }

    /// Values strictly between 0 and 1 are fractions, anything else a percent
    pub async fn set_volume(&self, volume: f64) -> Result<bool> {
        let percent = volume_percent(volume)?;
        tracing::debug!(percent, "API: set_volume");
        let path = format!("/me/player/volume?volume_percent={percent}");
        self.command(&path, Method::PUT, Some(json!({}))).await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<bool> {
        tracing::debug!(mode = %mode, "API: set_repeat");
        let path = format!("/me/player/repeat?state={mode}");
        self.command(&path, Method::PUT, Some(json!({}))).await
    }

    pub async fn set_shuffle(&self, state: bool) -> Result<bool> {
        tracing::debug!(state, "API: set_shuffle");
        let path = format!("/me/player/shuffle?state={state}");
        self.command(&path, Method::PUT, Some(json!({}))).await
    }

    /// Track metadata through the bounded cache; misses hit `/tracks/{id}`
    pub async fn track_information(&self, track_id: &str) -> Result<Track> {
        if track_id.is_empty() {
            return Err(ApiError::InvalidArgument("No track id specified".to_string()));
        }
        if let Some(track) = self.cache.get(track_id).await {
            tracing::trace!(track_id, "Track metadata cache hit");
            return Ok(track);
        }

        let cached = self.cache.len().await;
        tracing::debug!(
            track_id,
            cached,
            capacity = self.cache.capacity(),
            "Track metadata cache miss"
        );
        let track: Track = self.get(&format!("/tracks/{track_id}")).await?.parse()?;
        self.cache.insert(track_id.to_string(), track.clone()).await;
        Ok(track)
    }

    /// Seed the cache with metadata already embedded in a snapshot
    pub async fn cache_track(&self, track: &Track) {
        if let Some(id) = track.id.as_deref().filter(|id| !id.is_empty()) {
            self.cache.insert(id.to_string(), track.clone()).await;
        }
    }

    /// Run a command and report whether the service answered 204
    async fn command(&self, path: &str, method: Method, body: Option<serde_json::Value>) -> Result<bool> {
        Ok(self.execute(path, method, body).await?.is_no_content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_with;
    use crate::http::RequestBody;
    use crate::testing::ScriptedTransport;

    #[test]
    fn test_volume_percent_interpretation() {
        assert_eq!(volume_percent(0.5).unwrap(), 50);
        assert_eq!(volume_percent(0.257).unwrap(), 25);
        assert_eq!(volume_percent(40.0).unwrap(), 40);
        assert_eq!(volume_percent(0.0).unwrap(), 0);
        assert_eq!(volume_percent(1.0).unwrap(), 1);
        assert_eq!(volume_percent(100.0).unwrap(), 100);
        assert!(volume_percent(101.0).is_err());
        assert!(volume_percent(-3.0).is_err());
        assert!(volume_percent(f64::NAN).is_err());
    }

    #[tokio::test]
    async fn test_no_content_means_nothing_playing() {
        let transport = ScriptedTransport::new();
        transport.push_status(204);
        let client = client_with(&transport, Some("a1"));
        assert_eq!(client.playback_state().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_playback_snapshot_is_parsed() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({
            "is_playing": true,
            "progress_ms": 1000,
            "item": { "id": "T1", "name": "Song", "duration_ms": 2000 }
        }));
        let client = client_with(&transport, Some("a1"));

        let snapshot = client.playback_state().await.unwrap().unwrap();
        assert_eq!(snapshot.track_id(), Some("T1"));
        assert!(snapshot.is_playing);
    }

    #[tokio::test]
    async fn test_devices_are_listed() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({
            "devices": [
                { "id": "d1", "name": "Deck", "is_active": true, "volume_percent": 20 },
                { "id": "d2", "name": "Phone", "is_active": false, "volume_percent": null }
            ]
        }));
        let client = client_with(&transport, Some("a1"));

        let devices = client.devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "Deck");
        assert_eq!(devices[1].volume_percent, None);
    }

    #[tokio::test]
    async fn test_commands_hit_expected_endpoints() {
        let transport = ScriptedTransport::new();
        for _ in 0..8 {
            transport.push_status(204);
        }
        let client = client_with(&transport, Some("a1"));

        assert!(client.play().await.unwrap());
        assert!(client.pause().await.unwrap());
        assert!(client.next_track().await.unwrap());
        assert!(client.previous_track().await.unwrap());
        assert!(client.seek(1500).await.unwrap());
        assert!(client.set_volume(0.3).await.unwrap());
        assert!(client.set_repeat(RepeatMode::Context).await.unwrap());
        assert!(client.set_shuffle(true).await.unwrap());

        let calls: Vec<(Method, String)> = transport
            .requests()
            .into_iter()
            .map(|r| (r.method, r.url.trim_start_matches("https://api.test/v1").to_string()))
            .collect();
        assert_eq!(
            calls,
            vec![
                (Method::PUT, "/me/player/play".to_string()),
                (Method::PUT, "/me/player/pause".to_string()),
                (Method::POST, "/me/player/next".to_string()),
                (Method::POST, "/me/player/previous".to_string()),
                (Method::PUT, "/me/player/seek?position_ms=1500".to_string()),
                (Method::PUT, "/me/player/volume?volume_percent=30".to_string()),
                (Method::PUT, "/me/player/repeat?state=context".to_string()),
                (Method::PUT, "/me/player/shuffle?state=true".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_command_reports_non_204_success_as_false() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({}));
        let client = client_with(&transport, Some("a1"));
        assert!(!client.next_track().await.unwrap());
    }

    #[tokio::test]
    async fn test_transfer_playback_body() {
        let transport = ScriptedTransport::new();
        transport.push_status(204);
        let client = client_with(&transport, Some("a1"));

        assert!(client.transfer_playback("d1", true).await.unwrap());
        assert_eq!(
            transport.requests()[0].body,
            RequestBody::Json(json!({ "device_ids": ["d1"], "play": true }))
        );
        assert!(matches!(
            client.transfer_playback("", false).await,
            Err(ApiError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_track_information_fetches_once() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, json!({ "id": "T9", "name": "Fetched", "duration_ms": 1 }));
        let client = client_with(&transport, Some("a1"));

        assert_eq!(client.track_information("T9").await.unwrap().name, "Fetched");
        assert_eq!(client.track_information("T9").await.unwrap().name, "Fetched");
        assert_eq!(transport.requests_to("/tracks/T9").len(), 1);
    }

    #[tokio::test]
    async fn test_seeded_track_is_not_fetched() {
        let transport = ScriptedTransport::new();
        let client = client_with(&transport, Some("a1"));
        let track = Track {
            id: Some("T1".into()),
            name: "Embedded".into(),
            ..Default::default()
        };

        client.cache_track(&track).await;
        assert_eq!(client.track_information("T1").await.unwrap(), track);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_track_is_not_found() {
        let transport = ScriptedTransport::new();
        transport.push_status(404);
        let client = client_with(&transport, Some("a1"));
        assert!(matches!(client.track_information("nope").await, Err(ApiError::NotFound)));
        assert!(!client.cache().contains("nope").await);
        assert!(matches!(client.track_information("").await, Err(ApiError::InvalidArgument(_))));
    }
}
