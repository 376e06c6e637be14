//! Events emitted to UI bindings

use tokio::sync::broadcast;

use super::playback::Track;
use super::types::RepeatMode;

/// Capacity of the broadcast channel; slow subscribers lag instead of blocking polls
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A discrete change notification.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    TrackChanged(Track),
    RepeatModeChanged(RepeatMode),
    ShuffleModeChanged(bool),
    PlaybackStateChanged { playing: bool },
    /// Device volume normalized to 0..=1
    VolumeChanged(f32),
    ProgressTick { position_ms: u64, duration_ms: u64 },
    PlaybackCleared,
    /// The token endpoint handed out a new refresh credential that must be persisted
    CredentialRotated(String),
}

impl PlaybackEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackEvent::TrackChanged(_) => "track-changed",
            PlaybackEvent::RepeatModeChanged(_) => "repeat-mode-changed",
            PlaybackEvent::ShuffleModeChanged(_) => "shuffle-mode-changed",
            PlaybackEvent::PlaybackStateChanged { .. } => "playback-state-changed",
            PlaybackEvent::VolumeChanged(_) => "volume-changed",
            PlaybackEvent::ProgressTick { .. } => "progress-tick",
            PlaybackEvent::PlaybackCleared => "playback-cleared",
            PlaybackEvent::CredentialRotated(_) => "credential-rotated",
        }
    }

    /// Whether this event reports a diffed facet (everything except ticks and
    /// credential rotation)
    pub fn is_facet_change(&self) -> bool {
        !matches!(
            self,
            PlaybackEvent::ProgressTick { .. } | PlaybackEvent::CredentialRotated(_)
        )
    }
}

/// Sender half shared by the token manager and the controller
pub type EventSender = broadcast::Sender<PlaybackEvent>;

pub fn event_channel() -> EventSender {
    let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    sender
}
