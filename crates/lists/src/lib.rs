//! Arbiter Lists - Compliance-list membership
//!
//! Answers "is entity X present in an active list of kind K" with a bounded
//! cache in front of the store, and owns the write path whose cache
//! invalidation runs synchronously before any write is acknowledged.
//!
//! ## Key Components
//!
//! - [`resolver::ListMembershipResolver`] - cache-first membership facts
//! - [`service::ListService`] - list/entry writes with invalidation
//! - [`resolver::MembershipFact`] - the `{list_code, matched, metadata}` triple

pub mod error;
pub mod resolver;
pub mod service;

pub use error::{ListError, ListResult};
pub use resolver::{ListMembershipResolver, MembershipFact, MembershipRequest, ResolverConfig};
pub use service::ListService;
