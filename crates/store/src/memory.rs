//! In-memory store
//!
//! `RwLock`-protected maps; used by tests and embedded deployments. The
//! semantics (active-version filtering, half-open range queries, soft
//! deletes) match the SQLite implementation exactly.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use arbiter_core::{Alert, ComplianceList, EntityType, ListEntry, ListKind, Transaction};
use arbiter_rules::RuleVersion;

use crate::error::{StoreError, StoreResult};
use crate::{MembershipHit, Store};

#[derive(Default)]
struct Inner {
    rules: Vec<RuleVersion>,
    transactions: Vec<Transaction>,
    lists: HashMap<(String, String), ComplianceList>,
    entries: HashMap<(String, String), Vec<ListEntry>>,
    alerts: Vec<Alert>,
}

/// In-memory [`Store`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted alerts (test helper)
    pub fn alert_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").alerts.len()
    }

    /// Snapshot of persisted alerts (test helper)
    pub fn alerts(&self) -> Vec<Alert> {
        self.inner.read().expect("store lock poisoned").alerts.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("store lock poisoned")
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn active_rule_versions(
        &self,
        org_id: &str,
        as_of: DateTime<Utc>,
    ) -> StoreResult<Vec<RuleVersion>> {
        let inner = self.read();
        let mut rules: Vec<RuleVersion> = inner
            .rules
            .iter()
            .filter(|r| r.org_id == org_id && r.is_active_at(as_of))
            .cloned()
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(rules)
    }

    async fn insert_rule_version(&self, rule: &RuleVersion) -> StoreResult<()> {
        let mut inner = self.write();
        for existing in inner.rules.iter_mut() {
            if existing.org_id == rule.org_id
                && existing.template_id == rule.template_id
                && existing.is_active_at(rule.activated_at)
            {
                existing.deactivated_at = Some(rule.activated_at);
            }
        }
        inner.rules.push(rule.clone());
        Ok(())
    }

    async fn deactivate_rule_version(
        &self,
        org_id: &str,
        rule_version_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.write();
        let rule = inner
            .rules
            .iter_mut()
            .find(|r| r.org_id == org_id && r.id == rule_version_id)
            .ok_or_else(|| StoreError::NotFound(format!("rule version {}", rule_version_id)))?;

        if rule.deactivated_at.is_some() {
            return Err(StoreError::Conflict(format!(
                "rule version {} already deactivated",
                rule_version_id
            )));
        }
        rule.deactivated_at = Some(at);
        Ok(())
    }

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        self.write().transactions.push(tx.clone());
        Ok(())
    }

    async fn transactions_in_range(
        &self,
        org_id: &str,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Transaction>> {
        let inner = self.read();
        let mut rows: Vec<Transaction> = inner
            .transactions
            .iter()
            .filter(|t| {
                t.org_id == org_id
                    && t.account_id == account_id
                    && t.timestamp >= from
                    && t.timestamp < to
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.timestamp);
        Ok(rows)
    }

    async fn insert_alert(&self, alert: &Alert) -> StoreResult<String> {
        self.write().alerts.push(alert.clone());
        Ok(alert.id.clone())
    }

    async fn upsert_list(&self, list: &ComplianceList) -> StoreResult<()> {
        let mut inner = self.write();
        let key = (list.org_id.clone(), list.code.clone());
        inner.entries.entry(key.clone()).or_default();
        inner.lists.insert(key, list.clone());
        Ok(())
    }

    async fn add_list_entry(
        &self,
        org_id: &str,
        list_code: &str,
        entry: &ListEntry,
    ) -> StoreResult<()> {
        let mut inner = self.write();
        let key = (org_id.to_string(), list_code.to_string());
        if !inner.lists.contains_key(&key) {
            return Err(StoreError::NotFound(format!("list {}", list_code)));
        }
        let entries = inner.entries.entry(key).or_default();
        if entries.iter().any(|e| e.value == entry.value && !e.deleted) {
            return Err(StoreError::Conflict(format!(
                "entry {} already present in {}",
                entry.value, list_code
            )));
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn soft_delete_list(&self, org_id: &str, list_code: &str) -> StoreResult<()> {
        let mut inner = self.write();
        let key = (org_id.to_string(), list_code.to_string());
        let list = inner
            .lists
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("list {}", list_code)))?;
        list.deleted = true;
        Ok(())
    }

    async fn soft_delete_list_entry(
        &self,
        org_id: &str,
        list_code: &str,
        value: &str,
    ) -> StoreResult<()> {
        let mut inner = self.write();
        let key = (org_id.to_string(), list_code.to_string());
        let entries = inner
            .entries
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("list {}", list_code)))?;
        let entry = entries
            .iter_mut()
            .find(|e| e.value == value && !e.deleted)
            .ok_or_else(|| StoreError::NotFound(format!("entry {}", value)))?;
        entry.deleted = true;
        Ok(())
    }

    async fn find_list_entry(
        &self,
        org_id: &str,
        list_code: &str,
        value: &str,
    ) -> StoreResult<Option<ListEntry>> {
        let inner = self.read();
        let key = (org_id.to_string(), list_code.to_string());
        let active_list = inner.lists.get(&key).map(|l| l.is_active()).unwrap_or(false);
        if !active_list {
            return Ok(None);
        }
        Ok(inner
            .entries
            .get(&key)
            .and_then(|entries| entries.iter().find(|e| e.value == value && !e.deleted))
            .cloned())
    }

    async fn find_membership(
        &self,
        org_id: &str,
        kind: ListKind,
        entity_type: EntityType,
        value: &str,
    ) -> StoreResult<Option<MembershipHit>> {
        let inner = self.read();
        for ((owner, code), list) in inner.lists.iter() {
            if owner != org_id
                || !list.is_active()
                || list.kind != kind
                || list.entity_type != entity_type
            {
                continue;
            }
            let key = (owner.clone(), code.clone());
            if let Some(entry) = inner
                .entries
                .get(&key)
                .and_then(|entries| entries.iter().find(|e| e.value == value && !e.deleted))
            {
                return Ok(Some(MembershipHit {
                    list_code: code.clone(),
                    entry: entry.clone(),
                }));
            }
        }
        Ok(None)
    }
}
