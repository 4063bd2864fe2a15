//! Arbiter Signature - Authorization by signer-group thresholds
//!
//! A signature rule is a tree of `{group, min}` leaves combined with
//! `all`/`any`. The engine answers two questions:
//!
//! - **satisfaction**: do the SIGNED signatures collected so far satisfy the
//!   rule? Signer counts are per group and shared across every leaf that
//!   references the same group.
//! - **enumeration**: which minimal `{group: count}` combinations would
//!   satisfy the rule, for display and guidance before anyone has signed.
//!
//! Signatures are one-way state machines: `PENDING -> SIGNED | REJECTED`,
//! both terminal. Re-transitioning is a state-conflict error, never a no-op.
//!
//! ## Key Components
//!
//! - [`rule::SignatureRule`] - validated rule tree, org/schema/faculty scoped
//! - [`request::SignatureRequest`] - request + per-signer signature slots
//! - [`engine`] - satisfaction check
//! - [`combinations`] - minimal combination enumeration
//! - [`service::SignatureService`] - store-backed facade

pub mod combinations;
pub mod engine;
pub mod error;
pub mod request;
pub mod rule;
pub mod service;
pub mod store;

pub use combinations::{possible_combinations, Combination};
pub use engine::{is_satisfied, signed_counts};
pub use error::{SignatureError, SignatureResult};
pub use request::{RequestStatus, Signature, SignatureRequest, SignatureStatus};
pub use rule::{SignatureNode, SignatureRule, SignatureRuleBuilder};
pub use service::{SignatureConfig, SignatureService};
pub use store::SignatureStore;
