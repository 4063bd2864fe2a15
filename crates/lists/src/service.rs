//! List write path
//!
//! Every accepted write invalidates the organization's list cache family
//! before the call returns; a reader starting after the acknowledgment
//! never sees the pre-write state from cache.

use std::sync::Arc;

use tracing::info;

use arbiter_cache::CacheCoordinator;
use arbiter_core::{ComplianceList, ListEntry};
use arbiter_store::Store;

use crate::error::ListResult;

/// Management facade for compliance lists.
#[derive(Clone)]
pub struct ListService {
    store: Arc<dyn Store>,
    cache: CacheCoordinator,
}

impl ListService {
    /// Create a service over a store and cache
    pub fn new(store: Arc<dyn Store>, cache: CacheCoordinator) -> Self {
        Self { store, cache }
    }

    /// Create or replace a list definition.
    pub async fn upsert_list(&self, list: &ComplianceList) -> ListResult<()> {
        self.store.upsert_list(list).await?;
        self.cache.invalidate_lists(&list.org_id).await;
        info!(org_id = %list.org_id, code = %list.code, "list upserted");
        Ok(())
    }

    /// Add an entry to a list.
    pub async fn add_entry(
        &self,
        org_id: &str,
        list_code: &str,
        entry: ListEntry,
    ) -> ListResult<()> {
        self.store.add_list_entry(org_id, list_code, &entry).await?;
        self.cache.invalidate_lists(org_id).await;
        info!(org_id, list_code, value = %entry.value, "list entry added");
        Ok(())
    }

    /// Soft-delete a list; its entries stop matching immediately.
    pub async fn remove_list(&self, org_id: &str, list_code: &str) -> ListResult<()> {
        self.store.soft_delete_list(org_id, list_code).await?;
        self.cache.invalidate_lists(org_id).await;
        info!(org_id, list_code, "list soft-deleted");
        Ok(())
    }

    /// Soft-delete a single entry.
    pub async fn remove_entry(&self, org_id: &str, list_code: &str, value: &str) -> ListResult<()> {
        self.store
            .soft_delete_list_entry(org_id, list_code, value)
            .await?;
        self.cache.invalidate_lists(org_id).await;
        info!(org_id, list_code, value, "list entry soft-deleted");
        Ok(())
    }
}
