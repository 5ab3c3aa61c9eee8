//! Error types for category store operations.

use std::time::Duration;

use catalog_tree::{CategoryId, InvariantViolation, TreeError};
use thiserror::Error;

/// Errors that can occur while reading or mutating the category store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Referenced category does not exist.
    #[error("Category not found: {0}")]
    NotFound(CategoryId),

    /// Reparenting would put a node inside its own subtree (or under itself).
    #[error("Cannot move category {node} under {target}: target is inside the moved subtree")]
    Cycle {
        /// Node being moved.
        node: CategoryId,
        /// Requested new parent.
        target: CategoryId,
    },

    /// The advisory lock for a tree could not be acquired in time.
    #[error("Tree {tree_id} is locked by a concurrent mutation (waited {waited:?})")]
    ConcurrentModification {
        /// Tree whose lock timed out.
        tree_id: CategoryId,
        /// How long the caller waited.
        waited: Duration,
    },

    /// A post-mutation invariant check failed. Indicates a bug; never repaired.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(#[from] InvariantViolation),

    /// Category name rejected.
    #[error("Invalid category name: {0}")]
    InvalidName(String),

    /// The operation was cancelled by its caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// The operation exceeded its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// No pooled connection became available in time.
    #[error("Connection pool exhausted after waiting {0:?}")]
    PoolExhausted(Duration),

    /// Error from the relational backing store, surfaced verbatim.
    #[error("Backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    /// A blocking worker task failed (async adapter).
    #[error("Worker task failed: {0}")]
    TaskJoin(String),
}

impl From<TreeError> for StoreError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::InvalidName(message) => StoreError::InvalidName(message),
            TreeError::Invariant(violation) => StoreError::ConsistencyViolation(violation),
        }
    }
}

/// Result type for category store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = StoreError::NotFound(42);
        assert_eq!(err.to_string(), "Category not found: 42");
    }

    #[test]
    fn test_error_display_cycle() {
        let err = StoreError::Cycle { node: 1, target: 2 };
        assert_eq!(
            err.to_string(),
            "Cannot move category 1 under 2: target is inside the moved subtree"
        );
    }

    #[test]
    fn test_error_display_concurrent_modification() {
        let err = StoreError::ConcurrentModification {
            tree_id: 7,
            waited: Duration::from_millis(250),
        };
        assert_eq!(
            err.to_string(),
            "Tree 7 is locked by a concurrent mutation (waited 250ms)"
        );
    }

    #[test]
    fn test_error_display_timeout() {
        let err = StoreError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Operation timed out after 5s");
    }

    #[test]
    fn test_error_from_tree_error() {
        let err: StoreError = TreeError::InvalidName("primary form is empty".into()).into();
        assert!(matches!(err, StoreError::InvalidName(_)));

        let violation = InvariantViolation::MissingRoot { tree_id: 3 };
        let err: StoreError = TreeError::Invariant(violation.clone()).into();
        assert!(matches!(err, StoreError::ConsistencyViolation(v) if v == violation));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
