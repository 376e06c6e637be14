use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use spdck::auth::{exchange_authorization_code, CredentialStore, FileCredentialStore, TokenPair};
use spdck::config::DEFAULT_CONFIG_FILE;
use spdck::handshake::{generate_access_key, HandshakePeer};
use spdck::http::{HttpTransport, ReqwestTransport};
use spdck::{logging, Config, PlaybackController, PlaybackEvent, SpotifyClient};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("SPDCK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = Config::load(&config_path)?;

    if let Err(e) = logging::init_logging(&config.log_dir) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== spdck starting ===");

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    let store = Arc::new(FileCredentialStore::new(&config.credential_file));

    // Step 1: Get credentials
    let credentials = match store.load()? {
        Some(refresh_token) => {
            tracing::info!(path = %store.path().display(), "Using stored refresh token");
            TokenPair::new(refresh_token)
        }
        None => {
            let credentials = authorize(&config, transport.clone()).await?;
            store
                .store(&credentials.refresh_token)
                .context("saving refresh token")?;
            credentials
        }
    };

    // Step 2: Build the client and bind the event stream
    let client = SpotifyClient::new(&config, transport, credentials)?;
    let mut events = client.subscribe();
    let mut rotations = client.tokens().subscribe_refresh_token();

    if let Err(e) = client.tokens().ensure_access_token().await {
        if e.is_auth_error() {
            // The stored refresh token is dead; the next run starts a fresh handshake.
            store.remove().context("removing rejected refresh token")?;
        }
        return Err(e).context("obtaining an access token");
    }
    persist_rotations(&*store, &rotations)?;
    let store_for_rotations = store.clone();
    tokio::spawn(async move {
        // The watch keeps only the newest credential, so a slow write never loses a rotation.
        while rotations.changed().await.is_ok() {
            let _ = persist_rotations(&*store_for_rotations, &rotations);
        }
    });

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PlaybackEvent::ProgressTick { position_ms, duration_ms }) => {
                    tracing::trace!(position_ms, duration_ms, "Progress");
                }
                Ok(event) => tracing::info!(event = event.name(), detail = ?event, "Playback event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event listener lagged behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Step 3: Poll until interrupted
    let controller = PlaybackController::new(client);
    controller.start_with_config(&config);

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    controller.stop();

    tracing::info!("spdck shutting down");
    Ok(())
}

/// Persist the newest refresh credential when it differs from the stored one
fn persist_rotations(store: &dyn CredentialStore, rotations: &watch::Receiver<String>) -> Result<()> {
    let refresh_token = rotations.borrow().clone();
    if store.load()?.as_deref() == Some(refresh_token.as_str()) {
        return Ok(());
    }
    if let Err(e) = store.store(&refresh_token) {
        tracing::error!(error = %e, "Failed to persist rotated refresh token");
        return Err(e);
    }
    tracing::info!("Persisted rotated refresh token");
    Ok(())
}

/// One-time login through the handshake peer
async fn authorize(config: &Config, transport: Arc<dyn HttpTransport>) -> Result<TokenPair> {
    let access_key = match &config.access_key {
        Some(key) => key.clone(),
        None => {
            let key = generate_access_key();
            tracing::info!(access_key = %key, "Generated handshake access key");
            key
        }
    };

    let cancel = CancellationToken::new();
    let cancel_on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_interrupt.cancel();
        }
    });

    let peer = HandshakePeer::new(transport.clone(), config.handshake_peer.as_str());
    if !peer
        .wait_until_online(Some(config.handshake_timeout()), &cancel)
        .await
    {
        anyhow::bail!("handshake peer at {} did not come online", config.handshake_peer);
    }

    let login_url = peer.login_url();
    tracing::info!(url = %login_url, "Waiting for authorization");
    eprintln!("Open {login_url} to authorize spdck");

    let grant = peer
        .await_authorization(&access_key, &cancel)
        .await
        .context("waiting for authorization")?;

    let credentials = exchange_authorization_code(
        transport.as_ref(),
        &config.token_endpoint,
        &config.client_id,
        &config.redirect_uri(),
        &grant,
    )
    .await
    .context("exchanging authorization code")?;

    tracing::info!("Authorization complete");
    Ok(credentials)
}
