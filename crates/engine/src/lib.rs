//! Arbiter Engine - Rule evaluation
//!
//! ## Architecture
//!
//! ```text
//! Transaction
//!      │
//!      ▼
//! ┌──────────────┐    window facts    ┌───────────────────┐
//! │ FactResolver │◄──────────────────►│ WindowAggregator  │──► Store
//! │              │    list facts      ├───────────────────┤
//! │              │◄──────────────────►│ MembershipResolver│──► Cache/Store
//! └──────┬───────┘                    └───────────────────┘
//!        │ FactMap (per rule)
//!        ▼
//! ┌──────────────┐   active rules    ┌───────────────────┐
//! │ Orchestrator │◄─────────────────►│ CacheCoordinator  │
//! │  (per rule:  │                   └───────────────────┘
//! │   evaluate → │
//! │   actions)   │──► Alerts (Store), decision lattice max
//! └──────┬───────┘
//!        │ fire-and-forget
//!        ▼
//!    Notifier
//! ```
//!
//! Each rule's action execution is an independent commit: a caller deadline
//! abandons rules not yet evaluated but never rolls back alerts already
//! persisted, and the outcome is flagged partial.
//!
//! ## Key Components
//!
//! - [`eval`] - pure condition-tree evaluation with per-node traces
//! - [`window::WindowAggregator`] - deterministic `[as_of - d, as_of)` aggregates
//! - [`facts::FactResolver`] - transaction + window + list fact snapshots
//! - [`orchestrator::Orchestrator`] - the evaluation pipeline
//! - [`notifier::Notifier`] - fire-and-forget result publication

pub mod config;
pub mod error;
pub mod eval;
pub mod facts;
pub mod notifier;
pub mod orchestrator;
pub mod window;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use eval::{evaluate_tree, NodeTrace};
pub use facts::FactResolver;
pub use notifier::{ChannelNotifier, EvaluationEvent, NoopNotifier, Notifier};
pub use orchestrator::{EvaluationOutcome, Orchestrator};
pub use window::{WindowAggregator, WindowQuery};
