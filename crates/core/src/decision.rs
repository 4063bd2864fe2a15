//! Transaction decisions with formal lattice ordering
//!
//! Decisions follow a formal ordering for aggregation:
//! `Allow < Review < Block`
//!
//! Aggregation: `max(all_decisions)` - most restrictive wins

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Alert severity levels - ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Low
    }
}

/// Transaction decision - formal lattice
///
/// Ordering: `Allow < Review < Block`. The final decision for a transaction
/// is the `max()` across all triggered rules, never merely the last one
/// evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TxDecision {
    /// Transaction may proceed (lowest in lattice)
    Allow,
    /// Transaction requires manual review
    Review,
    /// Transaction is blocked (highest in lattice)
    Block,
}

impl TxDecision {
    /// Check if the transaction is allowed
    pub fn is_allow(&self) -> bool {
        matches!(self, TxDecision::Allow)
    }

    /// Check if the transaction requires review
    pub fn is_review(&self) -> bool {
        matches!(self, TxDecision::Review)
    }

    /// Check if the transaction is blocked
    pub fn is_block(&self) -> bool {
        matches!(self, TxDecision::Block)
    }

    fn order_value(&self) -> u8 {
        match self {
            TxDecision::Allow => 0,
            TxDecision::Review => 1,
            TxDecision::Block => 2,
        }
    }

    /// Aggregate multiple decisions: take the most restrictive
    pub fn aggregate(decisions: impl IntoIterator<Item = TxDecision>) -> TxDecision {
        decisions.into_iter().max().unwrap_or(TxDecision::Allow)
    }
}

impl PartialOrd for TxDecision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TxDecision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_value().cmp(&other.order_value())
    }
}

impl Default for TxDecision {
    fn default() -> Self {
        TxDecision::Allow
    }
}
