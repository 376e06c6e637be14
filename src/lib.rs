//! spdck - keeps a local view of Spotify playback in sync with the Web API
//!
//! The [`controller::PlaybackController`] polls the player endpoint, diffs
//! each snapshot against what it last reported and broadcasts
//! [`model::PlaybackEvent`]s. Commands (play, pause, skip, volume, ...) go
//! through the same authenticated [`client::SpotifyClient`].

pub mod auth;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod handshake;
pub mod http;
pub mod logging;
pub mod model;

#[cfg(test)]
mod testing;

pub use client::SpotifyClient;
pub use config::Config;
pub use controller::PlaybackController;
pub use error::{ApiError, Result};
pub use model::PlaybackEvent;
