//! List errors

use arbiter_store::StoreError;
use thiserror::Error;

/// Errors from list resolution and management
#[derive(Debug, Error)]
pub enum ListError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for list operations
pub type ListResult<T> = Result<T, ListError>;
