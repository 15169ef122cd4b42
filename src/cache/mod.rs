//! Generic TTL cache with background sweeping.
//!
//! # Responsibilities
//! - Memoize values with per-entry expiry
//! - Delete expired entries on read
//! - Sweep the whole map on a fixed interval to bound memory
//!
//! # Design Decisions
//! - An expired entry is never returned, even before the sweeper runs
//! - The sweeper is a cancellable task stopped by the shutdown channel,
//!   not a fire-and-forget timer

pub mod response;

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

pub use response::{cache_key, is_cacheable_path, CachedResponse};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Key/value store with per-entry expiry.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    sweep_interval: Duration,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            sweep_interval,
        }
    }

    /// Get a value; expired entries are deleted on read.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries.remove_if(key, |_, entry| now >= entry.expires_at);
        self.entries.get(key).map(|e| e.value.clone())
    }

    /// Insert with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Same expiry semantics as `get`.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delete every expired entry regardless of whether it is read again.
    pub fn sweep(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Cache sweep");
        }
    }

    /// Run the periodic sweeper until shutdown is signaled.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.sweep_interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Cache sweeper stopping");
                    break;
                }
            }
        }
    }
}
