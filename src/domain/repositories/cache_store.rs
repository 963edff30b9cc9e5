use async_trait::async_trait;
use std::time::Duration;

/// Key-value store with per-entry time-to-live.
///
/// Values are opaque strings; a `get` after `set` returns the same bytes until
/// the entry expires or is deleted.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration);

    async fn delete(&self, key: &str) -> bool;
}
