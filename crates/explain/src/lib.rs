//! Arbiter Explain - "why would this rule fire?"
//!
//! A deliberately independent reimplementation of the condition-tree and
//! window-aggregation semantics, used by reasoning tools to narrate an
//! evaluation without touching production state. It takes explicit
//! snapshots supplied by the caller, reads no store, no cache, persists
//! nothing, and shares no evaluation code with `arbiter-engine` - the two
//! are kept consistent purely by the cross-implementation consistency
//! tests.

pub mod condition;
pub mod window;

pub use condition::{explain_condition, explain_rule_evaluation, Explanation};
pub use window::{explain_aggregation, WindowExplanation};
