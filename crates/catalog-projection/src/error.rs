//! Error types for projection reads.

use catalog_store::StoreError;
use catalog_tree::CategoryId;
use thiserror::Error;

/// Errors raised while reading through a search-index projection.
#[derive(Error, Debug)]
pub enum ProjectionError {
    /// The projection holds no document for this id.
    #[error("Category not found in projection: {0}")]
    NotFound(CategoryId),

    /// The projection lags the store by more than the policy allows.
    #[error("Projection is stale: indexed revision {indexed}, store at {current} (max lag {max_lag})")]
    StaleProjection {
        /// Store revision the projection reflects.
        indexed: u64,
        /// Current store revision.
        current: u64,
        /// Largest lag the policy accepts.
        max_lag: u64,
    },

    /// Hits do not nest, typically because the index is part-way through a
    /// refresh. Retry after the projection catches up.
    #[error("Projection is inconsistent: hit [{left}, {right}] does not nest inside [{container_left}, {container_right}]")]
    Inconsistent {
        /// Offending hit's left boundary.
        left: i64,
        /// Offending hit's right boundary.
        right: i64,
        /// Left boundary of the hit it should nest in (or follow).
        container_left: i64,
        /// Right boundary of the hit it should nest in (or follow).
        container_right: i64,
    },

    /// A hit lacks metadata needed for the requested read.
    #[error("Index hit is missing field `{0}`")]
    MissingField(&'static str),

    /// Hit payload could not be decoded.
    #[error("Failed to decode index hits: {0}")]
    Decode(#[from] serde_json::Error),

    /// The backing store failed while indexing or reporting its revision.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for projection operations.
pub type ProjectionResult<T> = std::result::Result<T, ProjectionError>;
