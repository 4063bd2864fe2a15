//! Arbiter Store - Persistence contract
//!
//! The engine consumes persistence through the [`Store`] trait; every read is
//! point-in-time consistent as of the supplied timestamp and every entity is
//! scoped to one organization. Two implementations ship here:
//!
//! - [`MemoryStore`] - `RwLock`-protected in-memory store for tests and
//!   embedded use
//! - [`SqliteStore`] - rusqlite-backed store with the
//!   `(org_id, account_id, timestamp)` index the window aggregator's bounded
//!   range query depends on

pub mod error;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use arbiter_core::{Alert, ComplianceList, EntityType, ListEntry, ListKind, Transaction};
use arbiter_rules::RuleVersion;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A membership lookup hit: the matching list and entry.
#[derive(Debug, Clone)]
pub struct MembershipHit {
    pub list_code: String,
    pub entry: ListEntry,
}

/// Persistence contract consumed by the engine and resolvers.
///
/// All reads are point-in-time consistent; all writes preserve the
/// data-model invariants (append-only transactions, one active rule version
/// per template per instant, soft deletes).
#[async_trait]
pub trait Store: Send + Sync {
    /// Rule versions active at `as_of` for the organization, ordered by
    /// priority descending.
    async fn active_rule_versions(
        &self,
        org_id: &str,
        as_of: DateTime<Utc>,
    ) -> StoreResult<Vec<RuleVersion>>;

    /// Insert a rule version. If an active version of the same template
    /// exists, it is deactivated at the new version's activation instant in
    /// the same write, preserving the one-active-version invariant.
    async fn insert_rule_version(&self, rule: &RuleVersion) -> StoreResult<()>;

    /// Deactivate a rule version at the given instant.
    async fn deactivate_rule_version(
        &self,
        org_id: &str,
        rule_version_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Append a transaction row.
    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()>;

    /// Transactions for the account in the half-open range `[from, to)`,
    /// oldest first. Flagged (voided/blocked/deleted) rows are returned;
    /// exclusion policy belongs to the aggregator.
    async fn transactions_in_range(
        &self,
        org_id: &str,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Transaction>>;

    /// Persist an alert, returning its id.
    async fn insert_alert(&self, alert: &Alert) -> StoreResult<String>;

    /// Create or replace a list definition.
    async fn upsert_list(&self, list: &ComplianceList) -> StoreResult<()>;

    /// Add an entry to a list. Values are unique per list.
    async fn add_list_entry(
        &self,
        org_id: &str,
        list_code: &str,
        entry: &ListEntry,
    ) -> StoreResult<()>;

    /// Soft-delete a list.
    async fn soft_delete_list(&self, org_id: &str, list_code: &str) -> StoreResult<()>;

    /// Soft-delete a single entry.
    async fn soft_delete_list_entry(
        &self,
        org_id: &str,
        list_code: &str,
        value: &str,
    ) -> StoreResult<()>;

    /// Look up one entry by list code and value (active rows only).
    async fn find_list_entry(
        &self,
        org_id: &str,
        list_code: &str,
        value: &str,
    ) -> StoreResult<Option<ListEntry>>;

    /// Find the first active list of the given kind and entity type
    /// containing `value`.
    async fn find_membership(
        &self,
        org_id: &str,
        kind: ListKind,
        entity_type: EntityType,
        value: &str,
    ) -> StoreResult<Option<MembershipHit>>;
}
