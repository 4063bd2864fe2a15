//! Rule validation errors

use thiserror::Error;

/// Errors from rule parsing and validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown fact: {0}")]
    UnknownFact(String),

    #[error("Invalid condition shape: {0}")]
    InvalidShape(String),

    #[error("Operator {operator} expects {expected}")]
    BadOperand { operator: String, expected: String },

    #[error("Condition tree exceeds maximum depth of {0}")]
    TooDeep(usize),

    #[error("Rule has no actions")]
    NoActions,
}

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;
