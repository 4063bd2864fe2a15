//! Signature errors

use thiserror::Error;

/// Errors from the signature-authorization engine
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Invalid rule definition: {0}")]
    Validation(String),

    #[error("Request has expired")]
    Expired,
}

/// Result type for signature operations
pub type SignatureResult<T> = Result<T, SignatureError>;
