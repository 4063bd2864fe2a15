//! Arbiter Core - Domain types
//!
//! This crate contains the fundamental types shared across Arbiter:
//! - [`Transaction`]: immutable transaction fact record
//! - [`FactValue`]: typed values for rule evaluation, with an `Absent` sentinel
//! - [`TxDecision`]: formal decision lattice with `max()` aggregation
//! - [`Alert`]: alert produced by triggered rule actions, with a one-way
//!   status lifecycle
//! - [`ComplianceList`]: named, soft-deletable BLACKLIST/WHITELIST collections

pub mod alert;
pub mod decision;
pub mod fact;
pub mod list;
pub mod transaction;

pub use alert::{Alert, AlertError, AlertStatus};
pub use decision::{Severity, TxDecision};
pub use fact::{FactMap, FactValue};
pub use list::{ComplianceList, EntityType, ListEntry, ListKind};
pub use transaction::Transaction;
