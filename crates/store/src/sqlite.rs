//! SQLite storage
//!
//! Timestamps are stored as integer microseconds since the epoch so range
//! predicates compare numerically; decimals are stored as text to keep full
//! precision. The `(org_id, account_id, timestamp)` index serves the window
//! aggregator's bounded range query.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use arbiter_core::{Alert, ComplianceList, EntityType, ListEntry, ListKind, Transaction};
use arbiter_rules::{RuleVersion, WindowSpec};

use crate::error::{StoreError, StoreResult};
use crate::{MembershipHit, Store};

/// SQLite-backed [`Store`] implementation.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a store at the given database path
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS rule_versions (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL,
            template_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            conditions_json TEXT NOT NULL,
            actions_json TEXT NOT NULL,
            window_json TEXT,
            priority INTEGER NOT NULL,
            enabled INTEGER NOT NULL,
            activated_at INTEGER NOT NULL,
            deactivated_at INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_rule_versions_org_template
            ON rule_versions(org_id, template_id);

        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL,
            account_id TEXT NOT NULL,
            tx_type TEXT NOT NULL,
            sub_type TEXT,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            normalized_amount TEXT NOT NULL,
            normalized_currency TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            country TEXT,
            counterparty_id TEXT,
            channel TEXT,
            asset TEXT,
            quantity TEXT,
            price TEXT,
            voided INTEGER NOT NULL,
            blocked INTEGER NOT NULL,
            deleted INTEGER NOT NULL,
            metadata_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_org_account_ts
            ON transactions(org_id, account_id, timestamp);

        CREATE TABLE IF NOT EXISTS lists (
            org_id TEXT NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            deleted INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (org_id, code)
        );

        CREATE TABLE IF NOT EXISTS list_entries (
            org_id TEXT NOT NULL,
            list_code TEXT NOT NULL,
            value TEXT NOT NULL,
            label TEXT,
            metadata_json TEXT NOT NULL,
            deleted INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (org_id, list_code, value)
        );
        CREATE INDEX IF NOT EXISTS idx_list_entries_value
            ON list_entries(org_id, value);

        CREATE TABLE IF NOT EXISTS alerts (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL,
            rule_version_id TEXT NOT NULL,
            transaction_id TEXT NOT NULL,
            severity TEXT NOT NULL,
            category TEXT NOT NULL,
            message TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_alerts_org
            ON alerts(org_id, status);",
    )?;
    Ok(())
}

fn micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(value: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(value)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", value)))
}

fn decimal(value: &str) -> StoreResult<Decimal> {
    Decimal::from_str(value).map_err(|e| StoreError::Corrupt(format!("decimal {}: {}", value, e)))
}

fn opt_decimal(value: Option<String>) -> StoreResult<Option<Decimal>> {
    value.as_deref().map(decimal).transpose()
}

/// Raw rule row; JSON and timestamp columns decode outside the rusqlite
/// row callback, which can only fail with rusqlite errors.
struct RuleRow {
    id: String,
    org_id: String,
    template_id: String,
    version: u32,
    name: String,
    description: String,
    conditions_json: String,
    actions_json: String,
    window_json: Option<String>,
    priority: u32,
    enabled: bool,
    activated_at: i64,
    deactivated_at: Option<i64>,
    created_at: i64,
}

fn read_rule_row(row: &Row<'_>) -> rusqlite::Result<RuleRow> {
    Ok(RuleRow {
        id: row.get("id")?,
        org_id: row.get("org_id")?,
        template_id: row.get("template_id")?,
        version: row.get("version")?,
        name: row.get("name")?,
        description: row.get("description")?,
        conditions_json: row.get("conditions_json")?,
        actions_json: row.get("actions_json")?,
        window_json: row.get("window_json")?,
        priority: row.get("priority")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
        activated_at: row.get("activated_at")?,
        deactivated_at: row.get("deactivated_at")?,
        created_at: row.get("created_at")?,
    })
}

fn decode_rule(row: RuleRow) -> StoreResult<RuleVersion> {
    Ok(RuleVersion {
        id: row.id,
        org_id: row.org_id,
        template_id: row.template_id,
        version: row.version,
        name: row.name,
        description: row.description,
        conditions: serde_json::from_str(&row.conditions_json)?,
        actions: serde_json::from_str(&row.actions_json)?,
        window: row
            .window_json
            .as_deref()
            .map(serde_json::from_str::<WindowSpec>)
            .transpose()?,
        priority: row.priority,
        enabled: row.enabled,
        activated_at: from_micros(row.activated_at)?,
        deactivated_at: row.deactivated_at.map(from_micros).transpose()?,
        created_at: from_micros(row.created_at)?,
    })
}

struct TxRow {
    id: String,
    org_id: String,
    account_id: String,
    tx_type: String,
    sub_type: Option<String>,
    amount: String,
    currency: String,
    normalized_amount: String,
    normalized_currency: String,
    timestamp: i64,
    country: Option<String>,
    counterparty_id: Option<String>,
    channel: Option<String>,
    asset: Option<String>,
    quantity: Option<String>,
    price: Option<String>,
    voided: bool,
    blocked: bool,
    deleted: bool,
    metadata_json: String,
}

fn read_tx_row(row: &Row<'_>) -> rusqlite::Result<TxRow> {
    Ok(TxRow {
        id: row.get("id")?,
        org_id: row.get("org_id")?,
        account_id: row.get("account_id")?,
        tx_type: row.get("tx_type")?,
        sub_type: row.get("sub_type")?,
        amount: row.get("amount")?,
        currency: row.get("currency")?,
        normalized_amount: row.get("normalized_amount")?,
        normalized_currency: row.get("normalized_currency")?,
        timestamp: row.get("timestamp")?,
        country: row.get("country")?,
        counterparty_id: row.get("counterparty_id")?,
        channel: row.get("channel")?,
        asset: row.get("asset")?,
        quantity: row.get("quantity")?,
        price: row.get("price")?,
        voided: row.get::<_, i64>("voided")? != 0,
        blocked: row.get::<_, i64>("blocked")? != 0,
        deleted: row.get::<_, i64>("deleted")? != 0,
        metadata_json: row.get("metadata_json")?,
    })
}

fn decode_tx(row: TxRow) -> StoreResult<Transaction> {
    Ok(Transaction {
        id: row.id,
        org_id: row.org_id,
        account_id: row.account_id,
        tx_type: row.tx_type,
        sub_type: row.sub_type,
        amount: decimal(&row.amount)?,
        currency: row.currency,
        normalized_amount: decimal(&row.normalized_amount)?,
        normalized_currency: row.normalized_currency,
        timestamp: from_micros(row.timestamp)?,
        country: row.country,
        counterparty_id: row.counterparty_id,
        channel: row.channel,
        asset: row.asset,
        quantity: opt_decimal(row.quantity)?,
        price: opt_decimal(row.price)?,
        voided: row.voided,
        blocked: row.blocked,
        deleted: row.deleted,
        metadata: serde_json::from_str(&row.metadata_json)?,
    })
}

struct EntryRow {
    list_code: String,
    value: String,
    label: Option<String>,
    metadata_json: String,
    deleted: bool,
    created_at: i64,
}

fn read_entry_row(row: &Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        list_code: row.get("list_code")?,
        value: row.get("value")?,
        label: row.get("label")?,
        metadata_json: row.get("metadata_json")?,
        deleted: row.get::<_, i64>("deleted")? != 0,
        created_at: row.get("created_at")?,
    })
}

fn decode_entry(row: EntryRow) -> StoreResult<ListEntry> {
    Ok(ListEntry {
        value: row.value,
        label: row.label,
        metadata: serde_json::from_str::<HashMap<String, String>>(&row.metadata_json)?,
        deleted: row.deleted,
        created_at: from_micros(row.created_at)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn active_rule_versions(
        &self,
        org_id: &str,
        as_of: DateTime<Utc>,
    ) -> StoreResult<Vec<RuleVersion>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT * FROM rule_versions
             WHERE org_id = ?1 AND enabled = 1 AND activated_at <= ?2
               AND (deactivated_at IS NULL OR deactivated_at > ?2)
             ORDER BY priority DESC",
        )?;

        let rows = stmt.query_map(params![org_id, micros(as_of)], read_rule_row)?;
        let mut rules = Vec::new();
        for row in rows {
            rules.push(decode_rule(row?)?);
        }
        Ok(rules)
    }

    async fn insert_rule_version(&self, rule: &RuleVersion) -> StoreResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        // Deactivate the currently-active version of the same template in
        // the same write, so the one-active invariant holds at every commit.
        tx.execute(
            "UPDATE rule_versions SET deactivated_at = ?1
             WHERE org_id = ?2 AND template_id = ?3 AND enabled = 1
               AND activated_at <= ?1
               AND (deactivated_at IS NULL OR deactivated_at > ?1)",
            params![micros(rule.activated_at), rule.org_id, rule.template_id],
        )?;

        tx.execute(
            "INSERT INTO rule_versions
             (id, org_id, template_id, version, name, description,
              conditions_json, actions_json, window_json, priority, enabled,
              activated_at, deactivated_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                rule.id,
                rule.org_id,
                rule.template_id,
                rule.version,
                rule.name,
                rule.description,
                serde_json::to_string(&rule.conditions)?,
                serde_json::to_string(&rule.actions)?,
                rule.window.map(|w| serde_json::to_string(&w)).transpose()?,
                rule.priority,
                rule.enabled as i64,
                micros(rule.activated_at),
                rule.deactivated_at.map(micros),
                micros(rule.created_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    async fn deactivate_rule_version(
        &self,
        org_id: &str,
        rule_version_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        let already: Option<i64> = conn
            .query_row(
                "SELECT deactivated_at FROM rule_versions WHERE org_id = ?1 AND id = ?2",
                params![org_id, rule_version_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StoreError::NotFound(format!("rule version {}", rule_version_id))
                }
                other => StoreError::Database(other),
            })?;

        if already.is_some() {
            return Err(StoreError::Conflict(format!(
                "rule version {} already deactivated",
                rule_version_id
            )));
        }

        conn.execute(
            "UPDATE rule_versions SET deactivated_at = ?1 WHERE org_id = ?2 AND id = ?3",
            params![micros(at), org_id, rule_version_id],
        )?;
        Ok(())
    }

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO transactions
             (id, org_id, account_id, tx_type, sub_type, amount, currency,
              normalized_amount, normalized_currency, timestamp, country,
              counterparty_id, channel, asset, quantity, price, voided,
              blocked, deleted, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                tx.id,
                tx.org_id,
                tx.account_id,
                tx.tx_type,
                tx.sub_type,
                tx.amount.to_string(),
                tx.currency,
                tx.normalized_amount.to_string(),
                tx.normalized_currency,
                micros(tx.timestamp),
                tx.country,
                tx.counterparty_id,
                tx.channel,
                tx.asset,
                tx.quantity.map(|q| q.to_string()),
                tx.price.map(|p| p.to_string()),
                tx.voided as i64,
                tx.blocked as i64,
                tx.deleted as i64,
                serde_json::to_string(&tx.metadata)?,
            ],
        )?;
        Ok(())
    }

    async fn transactions_in_range(
        &self,
        org_id: &str,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Transaction>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT * FROM transactions
             WHERE org_id = ?1 AND account_id = ?2
               AND timestamp >= ?3 AND timestamp < ?4
             ORDER BY timestamp ASC",
        )?;

        let rows = stmt.query_map(
            params![org_id, account_id, micros(from), micros(to)],
            read_tx_row,
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(decode_tx(row?)?);
        }
        Ok(out)
    }

    async fn insert_alert(&self, alert: &Alert) -> StoreResult<String> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO alerts
             (id, org_id, rule_version_id, transaction_id, severity, category,
              message, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                alert.id,
                alert.org_id,
                alert.rule_version_id,
                alert.transaction_id,
                alert.severity.to_string(),
                alert.category,
                alert.message,
                alert.status.to_string(),
                micros(alert.created_at),
            ],
        )?;
        Ok(alert.id.clone())
    }

    async fn upsert_list(&self, list: &ComplianceList) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO lists
             (org_id, code, name, kind, entity_type, deleted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                list.org_id,
                list.code,
                list.name,
                list.kind.to_string(),
                list.entity_type.to_string(),
                list.deleted as i64,
                micros(list.created_at),
            ],
        )?;
        Ok(())
    }

    async fn add_list_entry(
        &self,
        org_id: &str,
        list_code: &str,
        entry: &ListEntry,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        let list_exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM lists WHERE org_id = ?1 AND code = ?2",
            params![org_id, list_code],
            |row| row.get(0),
        )?;
        if list_exists == 0 {
            return Err(StoreError::NotFound(format!("list {}", list_code)));
        }

        let duplicate: i64 = conn.query_row(
            "SELECT COUNT(*) FROM list_entries
             WHERE org_id = ?1 AND list_code = ?2 AND value = ?3 AND deleted = 0",
            params![org_id, list_code, entry.value],
            |row| row.get(0),
        )?;
        if duplicate > 0 {
            return Err(StoreError::Conflict(format!(
                "entry {} already present in {}",
                entry.value, list_code
            )));
        }

        conn.execute(
            "INSERT OR REPLACE INTO list_entries
             (org_id, list_code, value, label, metadata_json, deleted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                org_id,
                list_code,
                entry.value,
                entry.label,
                serde_json::to_string(&entry.metadata)?,
                entry.deleted as i64,
                micros(entry.created_at),
            ],
        )?;
        Ok(())
    }

    async fn soft_delete_list(&self, org_id: &str, list_code: &str) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE lists SET deleted = 1 WHERE org_id = ?1 AND code = ?2",
            params![org_id, list_code],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("list {}", list_code)));
        }
        Ok(())
    }

    async fn soft_delete_list_entry(
        &self,
        org_id: &str,
        list_code: &str,
        value: &str,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE list_entries SET deleted = 1
             WHERE org_id = ?1 AND list_code = ?2 AND value = ?3 AND deleted = 0",
            params![org_id, list_code, value],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("entry {}", value)));
        }
        Ok(())
    }

    async fn find_list_entry(
        &self,
        org_id: &str,
        list_code: &str,
        value: &str,
    ) -> StoreResult<Option<ListEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT e.list_code, e.value, e.label, e.metadata_json, e.deleted, e.created_at
             FROM list_entries e
             JOIN lists l ON l.org_id = e.org_id AND l.code = e.list_code
             WHERE e.org_id = ?1 AND e.list_code = ?2 AND e.value = ?3
               AND e.deleted = 0 AND l.deleted = 0
             LIMIT 1",
        )?;

        let mut rows = stmt.query_map(params![org_id, list_code, value], read_entry_row)?;
        match rows.next() {
            Some(raw) => Ok(Some(decode_entry(raw?)?)),
            None => Ok(None),
        }
    }

    async fn find_membership(
        &self,
        org_id: &str,
        kind: ListKind,
        entity_type: EntityType,
        value: &str,
    ) -> StoreResult<Option<MembershipHit>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT e.list_code, e.value, e.label, e.metadata_json, e.deleted, e.created_at
             FROM list_entries e
             JOIN lists l ON l.org_id = e.org_id AND l.code = e.list_code
             WHERE e.org_id = ?1 AND l.kind = ?2 AND l.entity_type = ?3
               AND e.value = ?4 AND e.deleted = 0 AND l.deleted = 0
             LIMIT 1",
        )?;

        let mut rows = stmt.query_map(
            params![org_id, kind.to_string(), entity_type.to_string(), value],
            read_entry_row,
        )?;

        match rows.next() {
            Some(raw) => {
                let raw = raw?;
                let list_code = raw.list_code.clone();
                Ok(Some(MembershipHit {
                    list_code,
                    entry: decode_entry(raw)?,
                }))
            }
            None => Ok(None),
        }
    }
}
