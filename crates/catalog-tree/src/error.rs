//! Error types for category values and invariant checks.

use thiserror::Error;

use crate::invariants::InvariantViolation;

/// Errors raised while building category values or validating a tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// A category name was rejected (empty primary form).
    #[error("invalid category name: {0}")]
    InvalidName(String),

    /// A nested-set invariant does not hold.
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// Result type for tree operations.
pub type TreeResult<T> = std::result::Result<T, TreeError>;
