//! In-process cache store
//!
//! Bounded LRU with a per-entry expiry. Expired entries are dropped lazily on
//! read, so there is no background sweeper.

use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::repositories::CacheStore;

/// Cache performance statistics
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate as percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct Entry {
    value: String,
    expires_at: Instant,
}

struct Inner {
    entries: LruCache<String, Entry>,
    stats: CacheStats,
}

pub struct MemoryCache {
    inner: Mutex<Inner>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats.clone()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        let cleared = inner.entries.len();
        inner.entries.clear();
        debug!(cleared_entries = cleared, "Cache cleared");
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let expired = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                let value = entry.value.clone();
                inner.stats.hits += 1;
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.pop(key);
            inner.stats.expirations += 1;
            debug!(key = %key, "Cache entry expired");
        }
        inner.stats.misses += 1;
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(365 * 24 * 3600));
        let mut inner = self.inner.lock().await;
        inner.entries.put(key.to_string(), Entry { value, expires_at });
        debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache entry stored");
    }

    async fn delete(&self, key: &str) -> bool {
        self.inner.lock().await.entries.pop(key).is_some()
    }
}
