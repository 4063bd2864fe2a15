//! Compliance lists - named BLACKLIST/WHITELIST collections
//!
//! Lists and entries are soft-deletable: a deleted row stays persisted but
//! never matches a membership lookup again.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a list blocks or allows its members
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ListKind {
    Blacklist,
    Whitelist,
}

/// Entity type a list is scoped to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityType {
    Country,
    Account,
    Counterparty,
}

/// A named compliance list scoped to one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceList {
    /// Owning organization
    pub org_id: String,

    /// Unique code within the organization (e.g., "SANCTIONED_COUNTRIES")
    pub code: String,

    /// Human-readable name
    pub name: String,

    /// Blacklist or whitelist
    pub kind: ListKind,

    /// Entity type the entries describe
    pub entity_type: EntityType,

    /// Soft-delete flag
    pub deleted: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ComplianceList {
    /// Create a new active list
    pub fn new(
        org_id: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
        kind: ListKind,
        entity_type: EntityType,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            code: code.into(),
            name: name.into(),
            kind,
            entity_type,
            deleted: false,
            created_at: Utc::now(),
        }
    }

    /// Whether lookups may match this list
    pub fn is_active(&self) -> bool {
        !self.deleted
    }
}

/// An entry of a compliance list, unique per `(list, value)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntry {
    /// Matched attribute value (e.g., "IR", an account id)
    pub value: String,

    /// Optional display label
    pub label: Option<String>,

    /// Free-form metadata attached to the entry
    pub metadata: HashMap<String, String>,

    /// Soft-delete flag
    pub deleted: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ListEntry {
    /// Create a new active entry
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: None,
            metadata: HashMap::new(),
            deleted: false,
            created_at: Utc::now(),
        }
    }

    /// Set the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
