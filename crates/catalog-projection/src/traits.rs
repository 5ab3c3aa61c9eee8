//! The search-index projection capability.
//!
//! A projection exposes the same three read shapes as the store (point
//! lookup, children by parent, range by boundaries) but answers with flat
//! [`IndexHit`]s. It is populated asynchronously, outside this crate, so
//! every answer may lag the store. Callers that must see their own writes
//! read [`CategoryStore`](catalog_store::CategoryStore) instead.

use std::sync::Arc;

use catalog_tree::CategoryId;

use crate::error::ProjectionResult;
use crate::hit::IndexHit;

/// Read access to an index of category documents.
pub trait SearchIndexProjection: Send + Sync {
    /// The document for `id`, if indexed.
    fn get(&self, id: CategoryId) -> ProjectionResult<Option<IndexHit>>;

    /// Direct children of `parent_id`, ascending `left`.
    fn children_of(&self, parent_id: CategoryId) -> ProjectionResult<Vec<IndexHit>>;

    /// Hits of `tree_id` whose `left` lies in `[left, right]`, ascending `left`.
    fn range(&self, tree_id: CategoryId, left: i64, right: i64) -> ProjectionResult<Vec<IndexHit>>;

    /// Hits of `tree_id` whose interval contains `[left, right]` (inclusive),
    /// ascending `left`, i.e. root first.
    fn ancestors_of(&self, tree_id: CategoryId, left: i64, right: i64) -> ProjectionResult<Vec<IndexHit>>;

    /// Store revision the indexed documents reflect.
    fn indexed_revision(&self) -> ProjectionResult<u64>;
}

impl<P: SearchIndexProjection + ?Sized> SearchIndexProjection for Arc<P> {
    fn get(&self, id: CategoryId) -> ProjectionResult<Option<IndexHit>> {
        (**self).get(id)
    }

    fn children_of(&self, parent_id: CategoryId) -> ProjectionResult<Vec<IndexHit>> {
        (**self).children_of(parent_id)
    }

    fn range(&self, tree_id: CategoryId, left: i64, right: i64) -> ProjectionResult<Vec<IndexHit>> {
        (**self).range(tree_id, left, right)
    }

    fn ancestors_of(&self, tree_id: CategoryId, left: i64, right: i64) -> ProjectionResult<Vec<IndexHit>> {
        (**self).ancestors_of(tree_id, left, right)
    }

    fn indexed_revision(&self) -> ProjectionResult<u64> {
        (**self).indexed_revision()
    }
}
