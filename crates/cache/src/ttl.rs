//! In-process TTL cache
//!
//! Sharded concurrent map with per-entry deadlines. Expiry is lazy: an
//! expired entry is dropped on the read that finds it, and `purge_expired`
//! exists for housekeeping in long-lived processes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::Cache;

struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Concurrent in-process [`Cache`] implementation with per-entry TTLs.
#[derive(Default)]
pub struct TtlCache {
    entries: DashMap<String, Entry>,
}

impl TtlCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live (non-expired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    /// Whether the cache holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }
}

#[async_trait]
impl Cache for TtlCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return Some(entry.value.clone()),
            None => return None,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    async fn delete_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get() {
        let cache = TtlCache::new();
        cache.set("a", json!({"x": 1}), Duration::from_secs(60)).await;

        assert_eq!(cache.get("a").await, Some(json!({"x": 1})));
        assert_eq!(cache.get("b").await, None);
    }

    #[tokio::test]
    async fn test_expiry() {
        let cache = TtlCache::new();
        cache.set("a", json!(1), Duration::from_millis(10)).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("a").await, None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = TtlCache::new();
        cache.set("a", json!(1), Duration::from_secs(60)).await;
        cache.delete("a").await;
        assert_eq!(cache.get("a").await, None);
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = TtlCache::new();
        cache.set("rules:ORG-1", json!(1), Duration::from_secs(60)).await;
        cache.set("rules:ORG-2", json!(2), Duration::from_secs(60)).await;
        cache.set("list:ORG-1:abc", json!(3), Duration::from_secs(60)).await;

        cache.delete_prefix("rules:").await;

        assert_eq!(cache.get("rules:ORG-1").await, None);
        assert_eq!(cache.get("rules:ORG-2").await, None);
        assert_eq!(cache.get("list:ORG-1:abc").await, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = TtlCache::new();
        cache.set("a", json!(1), Duration::from_millis(5)).await;
        cache.set("b", json!(2), Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.purge_expired();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_ttl() {
        let cache = TtlCache::new();
        cache.set("a", json!(1), Duration::from_millis(5)).await;
        cache.set("a", json!(2), Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("a").await, Some(json!(2)));
    }
}
