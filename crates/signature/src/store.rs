//! SQLite storage for signature rules, signer groups and requests

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::error::{SignatureError, SignatureResult};
use crate::request::{RequestStatus, Signature, SignatureRequest, SignatureStatus};
use crate::rule::SignatureRule;

/// SQLite storage for the signature subsystem.
pub struct SignatureStore {
    conn: Connection,
}

impl SignatureStore {
    /// Create a new store with the given database path
    pub fn new<P: AsRef<Path>>(path: P) -> SignatureResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> SignatureResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> SignatureResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS signature_rules (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                schema TEXT NOT NULL,
                faculty TEXT NOT NULL,
                definition_json TEXT NOT NULL,
                priority INTEGER NOT NULL,
                active INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signature_rules_scope
                ON signature_rules(org_id, schema, faculty);

            CREATE TABLE IF NOT EXISTS signer_groups (
                org_id TEXT NOT NULL,
                group_code TEXT NOT NULL,
                signer_id TEXT NOT NULL,
                PRIMARY KEY (org_id, group_code, signer_id)
            );
            CREATE INDEX IF NOT EXISTS idx_signer_groups_signer
                ON signer_groups(org_id, signer_id);

            CREATE TABLE IF NOT EXISTS signature_requests (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                rule_id TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                payload_hash TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signature_requests_status
                ON signature_requests(org_id, status);

            CREATE TABLE IF NOT EXISTS signatures (
                request_id TEXT NOT NULL,
                signer_id TEXT NOT NULL,
                status TEXT NOT NULL,
                decided_at INTEGER,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (request_id, signer_id)
            );",
        )?;
        Ok(())
    }

    /// Save a rule
    pub fn save_rule(&self, rule: &SignatureRule) -> SignatureResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO signature_rules
             (id, org_id, schema, faculty, definition_json, priority, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                rule.id,
                rule.org_id,
                rule.schema,
                rule.faculty,
                serde_json::to_string(&rule.definition)?,
                rule.priority,
                rule.active as i64,
                micros(rule.created_at),
            ],
        )?;
        Ok(())
    }

    /// Load a rule by id, organization scoped
    pub fn get_rule(&self, org_id: &str, rule_id: &str) -> SignatureResult<SignatureRule> {
        self.conn
            .query_row(
                "SELECT * FROM signature_rules WHERE org_id = ?1 AND id = ?2",
                params![org_id, rule_id],
                read_rule_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    SignatureError::NotFound(format!("rule {}", rule_id))
                }
                other => SignatureError::Database(other),
            })
            .and_then(decode_rule)
    }

    /// Add a signer to a group
    pub fn add_signer(&self, org_id: &str, group_code: &str, signer_id: &str) -> SignatureResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO signer_groups (org_id, group_code, signer_id)
             VALUES (?1, ?2, ?3)",
            params![org_id, group_code, signer_id],
        )?;
        Ok(())
    }

    /// Group memberships of the given signers: signer id -> group codes
    pub fn memberships(
        &self,
        org_id: &str,
        signer_ids: &[&str],
    ) -> SignatureResult<HashMap<String, Vec<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_code FROM signer_groups WHERE org_id = ?1 AND signer_id = ?2",
        )?;

        let mut memberships = HashMap::new();
        for signer_id in signer_ids {
            let groups = stmt
                .query_map(params![org_id, signer_id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            if !groups.is_empty() {
                memberships.insert(signer_id.to_string(), groups);
            }
        }
        Ok(memberships)
    }

    /// Save a request and all its signature slots
    pub fn save_request(&self, request: &SignatureRequest) -> SignatureResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO signature_requests
             (id, org_id, rule_id, payload_json, payload_hash, status, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                request.id,
                request.org_id,
                request.rule_id,
                request.payload_json,
                request.payload_hash,
                request.status.to_string(),
                micros(request.created_at),
                micros(request.expires_at),
            ],
        )?;

        for signature in &request.signatures {
            self.conn.execute(
                "INSERT OR REPLACE INTO signatures
                 (request_id, signer_id, status, decided_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    request.id,
                    signature.signer_id,
                    signature.status.to_string(),
                    signature.decided_at.map(micros),
                    micros(signature.created_at),
                ],
            )?;
        }
        Ok(())
    }

    /// Load a request with its signature slots, organization scoped
    pub fn get_request(&self, org_id: &str, request_id: &str) -> SignatureResult<SignatureRequest> {
        let mut request = self
            .conn
            .query_row(
                "SELECT * FROM signature_requests WHERE org_id = ?1 AND id = ?2",
                params![org_id, request_id],
                read_request_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    SignatureError::NotFound(format!("request {}", request_id))
                }
                other => SignatureError::Database(other),
            })
            .and_then(decode_request)?;

        let mut stmt = self.conn.prepare(
            "SELECT signer_id, status, decided_at, created_at
             FROM signatures WHERE request_id = ?1 ORDER BY created_at ASC, signer_id ASC",
        )?;
        let slots = stmt
            .query_map(params![request_id], read_signature_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        request.signatures = slots
            .into_iter()
            .map(decode_signature)
            .collect::<SignatureResult<Vec<_>>>()?;

        Ok(request)
    }
}

fn micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(value: i64) -> SignatureResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(value).ok_or_else(|| {
        SignatureError::Validation(format!("timestamp out of range: {}", value))
    })
}

struct RuleRow {
    id: String,
    org_id: String,
    schema: String,
    faculty: String,
    definition_json: String,
    priority: u32,
    active: bool,
    created_at: i64,
}

fn read_rule_row(row: &Row<'_>) -> rusqlite::Result<RuleRow> {
    Ok(RuleRow {
        id: row.get("id")?,
        org_id: row.get("org_id")?,
        schema: row.get("schema")?,
        faculty: row.get("faculty")?,
        definition_json: row.get("definition_json")?,
        priority: row.get("priority")?,
        active: row.get::<_, i64>("active")? != 0,
        created_at: row.get("created_at")?,
    })
}

fn decode_rule(row: RuleRow) -> SignatureResult<SignatureRule> {
    Ok(SignatureRule {
        id: row.id,
        org_id: row.org_id,
        schema: row.schema,
        faculty: row.faculty,
        definition: serde_json::from_str(&row.definition_json)?,
        priority: row.priority,
        active: row.active,
        created_at: from_micros(row.created_at)?,
    })
}

struct RequestRow {
    id: String,
    org_id: String,
    rule_id: String,
    payload_json: String,
    payload_hash: String,
    status: String,
    created_at: i64,
    expires_at: i64,
}

fn read_request_row(row: &Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get("id")?,
        org_id: row.get("org_id")?,
        rule_id: row.get("rule_id")?,
        payload_json: row.get("payload_json")?,
        payload_hash: row.get("payload_hash")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
    })
}

fn decode_request(row: RequestRow) -> SignatureResult<SignatureRequest> {
    let status = RequestStatus::from_str(&row.status)
        .map_err(|_| SignatureError::Validation(format!("unknown request status {}", row.status)))?;
    Ok(SignatureRequest {
        id: row.id,
        org_id: row.org_id,
        rule_id: row.rule_id,
        payload_json: row.payload_json,
        payload_hash: row.payload_hash,
        signatures: Vec::new(),
        status,
        created_at: from_micros(row.created_at)?,
        expires_at: from_micros(row.expires_at)?,
    })
}

struct SignatureRow {
    signer_id: String,
    status: String,
    decided_at: Option<i64>,
    created_at: i64,
}

fn read_signature_row(row: &Row<'_>) -> rusqlite::Result<SignatureRow> {
    Ok(SignatureRow {
        signer_id: row.get("signer_id")?,
        status: row.get("status")?,
        decided_at: row.get("decided_at")?,
        created_at: row.get("created_at")?,
    })
}

fn decode_signature(row: SignatureRow) -> SignatureResult<Signature> {
    let status = SignatureStatus::from_str(&row.status).map_err(|_| {
        SignatureError::Validation(format!("unknown signature status {}", row.status))
    })?;
    Ok(Signature {
        signer_id: row.signer_id,
        status,
        decided_at: row.decided_at.map(from_micros).transpose()?,
        created_at: from_micros(row.created_at)?,
    })
}
