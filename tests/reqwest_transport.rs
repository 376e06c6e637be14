//! End-to-end checks of the reqwest transport against a local mock server

use std::sync::Arc;

use mockito::Matcher;
use serde_json::json;

use spdck::auth::{CredentialStore, FileCredentialStore, TokenPair};
use spdck::http::ReqwestTransport;
use spdck::model::RepeatMode;
use spdck::{ApiError, Config, PlaybackController, PlaybackEvent, SpotifyClient};

fn client_for(server: &mockito::ServerGuard, access_token: Option<&str>) -> SpotifyClient {
    let config = Config {
        api_endpoint: format!("{}/v1", server.url()),
        token_endpoint: format!("{}/api/token", server.url()),
        client_id: "client-1".to_string(),
        ..Config::default()
    };
    let mut credentials = TokenPair::new("refresh-1");
    if let Some(token) = access_token {
        credentials = credentials.with_access_token(token);
    }
    let transport = Arc::new(ReqwestTransport::new().unwrap());
    SpotifyClient::new(&config, transport, credentials).unwrap()
}

#[tokio::test]
async fn test_no_content_snapshot_is_none() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/me/player")
        .match_header("authorization", "Bearer a1")
        .with_status(204)
        .create_async()
        .await;

    let client = client_for(&server, Some("a1"));
    assert_eq!(client.playback_state().await.unwrap(), None);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_snapshot_is_parsed_and_reconciled() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({
        "item": {
            "id": "T1",
            "name": "Song",
            "duration_ms": 200000,
            "artists": [{ "name": "Artist" }],
            "album": { "name": "Album", "images": [] }
        },
        "is_playing": true,
        "shuffle_state": true,
        "repeat_state": "track",
        "progress_ms": 5000,
        "device": { "id": "d1", "name": "Deck", "is_active": true, "volume_percent": 40 }
    });
    server
        .mock("GET", "/v1/me/player")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let controller = PlaybackController::new(client_for(&server, Some("a1")));
    let mut events = controller.subscribe();
    controller.poll(true).await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(received.len(), 6);
    assert!(matches!(&received[0], PlaybackEvent::TrackChanged(t) if t.name == "Song"));
    assert_eq!(received[1], PlaybackEvent::RepeatModeChanged(RepeatMode::Track));
    assert_eq!(received[4], PlaybackEvent::VolumeChanged(0.4));
    assert_eq!(
        received[5],
        PlaybackEvent::ProgressTick { position_ms: 5000, duration_ms: 200000 }
    );
}

#[tokio::test]
async fn test_forbidden_maps_to_permission_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("PUT", "/v1/me/player/pause")
        .with_status(403)
        .with_body(r#"{"error":{"status":403,"message":"Premium required"}}"#)
        .create_async()
        .await;

    let client = client_for(&server, Some("a1"));
    assert!(matches!(client.pause().await, Err(ApiError::Permission)));
}

#[tokio::test]
async fn test_volume_command_sends_query_parameter() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/v1/me/player/volume")
        .match_query(Matcher::UrlEncoded("volume_percent".into(), "25".into()))
        .with_status(204)
        .create_async()
        .await;

    let client = client_for(&server, Some("a1"));
    assert!(client.set_volume(0.25).await.unwrap());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_access_token_is_exchanged_with_form_body() {
    let mut server = mockito::Server::new_async().await;
    let token = server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
            Matcher::UrlEncoded("client_id".into(), "client-1".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"fresh","refresh_token":"refresh-2","expires_in":3600}"#)
        .create_async()
        .await;
    let player = server
        .mock("GET", "/v1/me/player")
        .match_header("authorization", "Bearer fresh")
        .with_status(204)
        .create_async()
        .await;

    let client = client_for(&server, None);
    let mut events = client.subscribe();
    assert_eq!(client.playback_state().await.unwrap(), None);

    token.assert_async().await;
    player.assert_async().await;
    assert_eq!(client.tokens().refresh_token().await, "refresh-2");
    assert_eq!(
        events.try_recv().unwrap(),
        PlaybackEvent::CredentialRotated("refresh-2".to_string())
    );
}

#[test]
fn test_file_credential_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path().join("cache").join("refresh_token"));

    assert_eq!(store.load().unwrap(), None);
    store.store("refresh-9").unwrap();
    assert_eq!(store.load().unwrap().as_deref(), Some("refresh-9"));
    store.remove().unwrap();
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_token_endpoint_outage_is_a_server_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/token")
        .with_status(503)
        .with_body("<html>Service Unavailable</html>")
        .create_async()
        .await;

    let client = client_for(&server, None);
    let err = client.playback_state().await.unwrap_err();
    assert!(matches!(err, ApiError::Server));
    assert!(!err.is_auth_error());
}
