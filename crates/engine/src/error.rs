//! Engine errors
//!
//! Cache failures never appear here: they are absorbed as misses at the
//! cache boundary. A caller deadline is not an error either - the
//! orchestrator returns a partial outcome instead.

use thiserror::Error;

/// Errors from the evaluation engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] arbiter_rules::RuleError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cross-tenant access denied: transaction belongs to {actual}, caller asked for {requested}")]
    TenantIsolation { requested: String, actual: String },

    #[error("Store error: {0}")]
    Store(#[from] arbiter_store::StoreError),

    #[error("List error: {0}")]
    List(#[from] arbiter_lists::ListError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
