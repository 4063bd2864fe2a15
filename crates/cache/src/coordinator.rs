//! Cache coordinator - organization-scoped key families
//!
//! Two independent families exist per organization: the active rule set
//! (`rules:{org}`) and list-membership facts (`list:{org}:{hash}`), plus a
//! per-list per-value entry cache (`entry:{org}:{list}:{hash}`). Any write
//! to rules or lists must invalidate the matching family for that
//! organization before the write is acknowledged; readers that start after
//! the acknowledgment never observe the pre-write state from cache.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::Cache;

/// Organization-scoped facade over the raw [`Cache`] capability.
#[derive(Clone)]
pub struct CacheCoordinator {
    cache: Arc<dyn Cache>,
}

impl CacheCoordinator {
    /// Wrap a cache backend
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Key of the active rule set for an organization
    pub fn rules_key(org_id: &str) -> String {
        format!("rules:{}", org_id)
    }

    /// Key of a list-membership fact
    pub fn list_key(org_id: &str, attr_hash: &str) -> String {
        format!("list:{}:{}", org_id, attr_hash)
    }

    /// Key of a single list-entry lookup
    pub fn entry_key(org_id: &str, list_code: &str, value_hash: &str) -> String {
        format!("entry:{}:{}:{}", org_id, list_code, value_hash)
    }

    /// Stable hash of the attribute parts a membership fact is keyed by
    pub fn attr_hash(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(&hasher.finalize()[..16])
    }

    /// Typed read. Any miss, expired entry or decode failure is `None`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "dropping undecodable cache entry");
                self.cache.delete(key).await;
                None
            }
        }
    }

    /// Typed write. Serialization failures degrade to a skipped write.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(encoded) => self.cache.set(key, encoded, ttl).await,
            Err(e) => warn!(key, error = %e, "skipping unserializable cache write"),
        }
    }

    /// Invalidate the active-rules family for an organization.
    ///
    /// Called synchronously before a rule write is acknowledged.
    pub async fn invalidate_rules(&self, org_id: &str) {
        self.cache.delete(&Self::rules_key(org_id)).await;
    }

    /// Invalidate every list fact and entry for an organization.
    ///
    /// Called synchronously before a list write is acknowledged.
    pub async fn invalidate_lists(&self, org_id: &str) {
        self.cache.delete_prefix(&format!("list:{}:", org_id)).await;
        self.cache.delete_prefix(&format!("entry:{}:", org_id)).await;
    }
}
