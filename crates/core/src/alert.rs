//! Alert - Produced by triggered rule actions
//!
//! Status lifecycle: `Open -> Acknowledged -> Resolved | Dismissed`
//! (resolve/dismiss are also reachable straight from `Open`).
//! `Resolved` and `Dismissed` are terminal; transitions out of them are
//! state-conflict errors, not no-ops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decision::Severity;

/// Errors from alert state transitions
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("Invalid alert transition: {from} -> {to}")]
    InvalidTransition { from: AlertStatus, to: AlertStatus },
}

/// Status of an alert
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    /// Whether the status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::Dismissed)
    }
}

/// An alert raised by a triggered rule action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert ID
    pub id: String,

    /// Owning organization
    pub org_id: String,

    /// Rule version whose action created the alert
    pub rule_version_id: String,

    /// Transaction that triggered the rule
    pub transaction_id: String,

    /// Alert severity
    pub severity: Severity,

    /// Category (e.g., "aml", "velocity", "internal")
    pub category: String,

    /// Human-readable message
    pub message: String,

    /// Current status
    pub status: AlertStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Create a new open alert.
    pub fn new(
        org_id: impl Into<String>,
        rule_version_id: impl Into<String>,
        transaction_id: impl Into<String>,
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let id = format!("ALRT-{}", &uuid::Uuid::new_v4().to_string()[..8].to_uppercase());
        Self {
            id,
            org_id: org_id.into(),
            rule_version_id: rule_version_id.into(),
            transaction_id: transaction_id.into(),
            severity,
            category: category.into(),
            message: message.into(),
            status: AlertStatus::Open,
            created_at: Utc::now(),
        }
    }

    fn transition(&mut self, to: AlertStatus) -> Result<(), AlertError> {
        let allowed = match (self.status, to) {
            (AlertStatus::Open, AlertStatus::Acknowledged)
            | (AlertStatus::Open, AlertStatus::Resolved)
            | (AlertStatus::Open, AlertStatus::Dismissed)
            | (AlertStatus::Acknowledged, AlertStatus::Resolved)
            | (AlertStatus::Acknowledged, AlertStatus::Dismissed) => true,
            _ => false,
        };

        if !allowed {
            return Err(AlertError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Mark the alert as acknowledged
    pub fn acknowledge(&mut self) -> Result<(), AlertError> {
        self.transition(AlertStatus::Acknowledged)
    }

    /// Mark the alert as resolved (terminal)
    pub fn resolve(&mut self) -> Result<(), AlertError> {
        self.transition(AlertStatus::Resolved)
    }

    /// Mark the alert as dismissed (terminal)
    pub fn dismiss(&mut self) -> Result<(), AlertError> {
        self.transition(AlertStatus::Dismissed)
    }
}
