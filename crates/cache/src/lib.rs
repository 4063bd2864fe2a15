//! Arbiter Cache - Injected cache capability
//!
//! The cache is modelled as an injected capability: callers hold an
//! `Arc<dyn Cache>` and must keep working when the backend is gone. No
//! method returns an error - a failing or absent backend degrades to
//! "always miss", never to a failure on the evaluation path.
//!
//! ## Key Components
//!
//! - [`Cache`] - get/set/delete/delete_prefix capability, infallible
//! - [`TtlCache`] - concurrent in-process implementation with per-entry TTLs
//! - [`NoopCache`] - the degraded always-miss mode as an explicit type
//! - [`CacheCoordinator`] - organization-scoped key families and the
//!   synchronous invalidation discipline

pub mod coordinator;
pub mod ttl;

use async_trait::async_trait;
use std::time::Duration;

pub use coordinator::CacheCoordinator;
pub use ttl::TtlCache;

/// Cache capability.
///
/// Implementations must never error: a broken backend behaves as a miss on
/// reads and as a no-op on writes. Correctness never depends on cache
/// presence.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a key. Expired and missing entries both return `None`.
    async fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Store a value with a TTL.
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration);

    /// Remove a single key.
    async fn delete(&self, key: &str);

    /// Remove every key starting with `prefix`.
    async fn delete_prefix(&self, prefix: &str);
}

/// Always-miss cache used when no backend is configured or the backend is
/// known to be unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }

    async fn set(&self, _key: &str, _value: serde_json::Value, _ttl: Duration) {}

    async fn delete(&self, _key: &str) {}

    async fn delete_prefix(&self, _prefix: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_always_misses() {
        let cache = NoopCache;
        cache
            .set("k", serde_json::json!(1), Duration::from_secs(60))
            .await;
        assert!(cache.get("k").await.is_none());
    }
}
