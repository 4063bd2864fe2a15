//! Arbiter Rules - Rule model and validation
//!
//! Rules arrive as loosely-typed nested JSON authored by compliance teams.
//! This crate validates them **once**, at creation time, into a closed tagged
//! shape ([`ConditionNode`]) that the evaluators consume without
//! re-validation:
//!
//! ```text
//! {"all": [                         ConditionNode::All
//!    {"fact": "amount",       ──►     ConditionNode::Leaf {
//!     "operator": "greaterThan",        fact, operator: GreaterThan,
//!     "value": 10000}                   value: Number(10000) }
//! ]}
//! ```
//!
//! ## Key Components
//!
//! - [`condition::ConditionNode`] - closed AND/OR/leaf condition tree
//! - [`condition::Operator`] - comparison operator vocabulary
//! - [`rule::RuleVersion`] - immutable, effective-interval scoped rule version
//! - [`rule::RuleAction`] - alert creation / decision contribution

pub mod condition;
pub mod error;
pub mod rule;

pub use condition::{AggregateKind, ConditionNode, Operator, WindowFact};
pub use error::{RuleError, RuleResult};
pub use rule::{RuleAction, RuleVersion, RuleVersionBuilder, WindowSpec, WindowUnit};
