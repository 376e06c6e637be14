//! Model module - data types shared by the client and the controller
//!
//! - `types`: devices and repeat mode
//! - `playback`: snapshot, track metadata and observed state
//! - `events`: change notifications delivered to UI bindings
//! - `cache`: bounded track metadata cache

mod types;
mod playback;
mod events;
mod cache;

pub use types::{DeviceInfo, RepeatMode};

pub use playback::{
    normalize_volume, Album, Artist, ExternalUrls, Image, ObservedState, PlaybackSnapshot, Track,
    DEFAULT_VOLUME_PERCENT,
};

pub use events::{event_channel, EventSender, PlaybackEvent, EVENT_CHANNEL_CAPACITY};

pub use cache::{TrackCache, DEFAULT_CACHE_CAPACITY};
