//! Capacity-bounded track metadata cache with least-recently-used eviction

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::playback::Track;

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

struct CacheEntry {
    track: Track,
    last_access: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    // Logical clock; strictly increasing so recency never ties.
    clock: u64,
}

impl CacheInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Track metadata keyed by track id
#[derive(Clone)]
pub struct TrackCache {
    inner: Arc<Mutex<CacheInner>>,
    capacity: usize,
}

impl TrackCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            capacity: capacity.max(1),
        }
    }

    /// Returns the cached track and marks it as most recently used
    pub async fn get(&self, track_id: &str) -> Option<Track> {
        let mut inner = self.inner.lock().await;
        let stamp = inner.tick();
        inner.entries.get_mut(track_id).map(|entry| {
            entry.last_access = stamp;
            entry.track.clone()
        })
    }

    /// Stores a track with a fresh recency stamp, evicting the least recently
    /// used entry when the capacity is exceeded. Returns the evicted id.
    pub async fn insert(&self, track_id: String, track: Track) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let stamp = inner.tick();
        inner.entries.insert(track_id, CacheEntry { track, last_access: stamp });

        if inner.entries.len() <= self.capacity {
            return None;
        }
        let oldest = inner
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(id, _)| id.clone())?;
        inner.entries.remove(&oldest);
        tracing::trace!(track_id = %oldest, "Evicted track from metadata cache");
        Some(oldest)
    }

    pub async fn contains(&self, track_id: &str) -> bool {
        self.inner.lock().await.entries.contains_key(track_id)
    }

    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TrackCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
