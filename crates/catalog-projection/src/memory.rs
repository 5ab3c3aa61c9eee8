//! In-memory projection.
//!
//! Documents are keyed by `(tree_id, left)` so range and ancestor reads are
//! ordered scans of one tree. The projection is refreshed only when told
//! to, either from a store snapshot or from decoded hits, so between
//! refreshes it is as stale as any external index.

use std::collections::{BTreeMap, HashMap};

use catalog_store::CategoryStore;
use catalog_tree::CategoryId;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::ProjectionResult;
use crate::hit::IndexHit;
use crate::traits::SearchIndexProjection;

#[derive(Debug, Default)]
struct Index {
    documents: BTreeMap<(CategoryId, i64), IndexHit>,
    by_id: HashMap<CategoryId, (CategoryId, i64)>,
    revision: u64,
}

impl Index {
    fn insert(&mut self, hit: IndexHit) -> ProjectionResult<()> {
        let id = hit.require_id()?;
        let key = (hit.require_tree_id()?, hit.left);
        if let Some(old) = self.by_id.insert(id, key) {
            self.documents.remove(&old);
        }
        if let Some(displaced) = self.documents.insert(key, hit) {
            if let Some(other) = displaced.id.filter(|other| *other != id) {
                self.by_id.remove(&other);
            }
        }
        Ok(())
    }
}

/// A [`SearchIndexProjection`] held in process memory.
///
/// # Example
///
/// ```rust
/// use catalog_projection::{InMemoryProjection, SearchIndexProjection};
/// use catalog_store::{CategoryStore, EdgeCategoryStore};
/// use catalog_tree::NewCategory;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = EdgeCategoryStore::new();
/// let root = store.insert_root(NewCategory::named("Electronics")?)?;
/// store.insert_child(root.id, NewCategory::named("Phones")?)?;
///
/// let projection = InMemoryProjection::new();
/// assert_eq!(projection.index_from_store(&store)?, 2);
/// assert_eq!(projection.children_of(root.id)?.len(), 1);
/// assert_eq!(projection.indexed_revision()?, store.revision()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryProjection {
    index: RwLock<Index>,
}

impl InMemoryProjection {
    /// Creates an empty projection at revision 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every document with a snapshot of `store`. Returns the
    /// number of documents indexed.
    ///
    /// The revision is read before the documents, so a mutation racing the
    /// snapshot leaves the projection looking older, never newer.
    pub fn index_from_store<S>(&self, store: &S) -> ProjectionResult<usize>
    where
        S: CategoryStore + ?Sized,
    {
        let revision = store.revision()?;
        let mut fresh = Index {
            revision,
            ..Index::default()
        };
        for root in store.find_roots()? {
            for node in store.find_descendants(root.id)? {
                fresh.insert(IndexHit::from_node(&node))?;
            }
        }
        let count = fresh.by_id.len();
        *self.index.write() = fresh;
        debug!(count, revision, "projection rebuilt from store");
        Ok(count)
    }

    /// Replaces every document with `hits` indexed at `revision`.
    ///
    /// Each hit needs `id` and `tree_id`. Nothing changes if one lacks them.
    pub fn replace_all(&self, hits: Vec<IndexHit>, revision: u64) -> ProjectionResult<usize> {
        let mut fresh = Index {
            revision,
            ..Index::default()
        };
        for hit in hits {
            fresh.insert(hit)?;
        }
        let count = fresh.by_id.len();
        *self.index.write() = fresh;
        Ok(count)
    }

    /// Adds or replaces one document without changing the revision.
    pub fn upsert(&self, hit: IndexHit) -> ProjectionResult<()> {
        self.index.write().insert(hit)
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.index.read().by_id.len()
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SearchIndexProjection for InMemoryProjection {
    fn get(&self, id: CategoryId) -> ProjectionResult<Option<IndexHit>> {
        let index = self.index.read();
        Ok(index
            .by_id
            .get(&id)
            .and_then(|key| index.documents.get(key))
            .cloned())
    }

    fn children_of(&self, parent_id: CategoryId) -> ProjectionResult<Vec<IndexHit>> {
        let index = self.index.read();
        let Some(&(tree_id, _)) = index.by_id.get(&parent_id) else {
            return Ok(Vec::new());
        };
        Ok(index
            .documents
            .range((tree_id, i64::MIN)..=(tree_id, i64::MAX))
            .map(|(_, hit)| hit)
            .filter(|hit| hit.parent_id == Some(parent_id) && hit.id != Some(parent_id))
            .cloned()
            .collect())
    }

    fn range(&self, tree_id: CategoryId, left: i64, right: i64) -> ProjectionResult<Vec<IndexHit>> {
        if left > right {
            return Ok(Vec::new());
        }
        Ok(self
            .index
            .read()
            .documents
            .range((tree_id, left)..=(tree_id, right))
            .map(|(_, hit)| hit.clone())
            .collect())
    }

    fn ancestors_of(&self, tree_id: CategoryId, left: i64, right: i64) -> ProjectionResult<Vec<IndexHit>> {
        Ok(self
            .index
            .read()
            .documents
            .range((tree_id, i64::MIN)..=(tree_id, left))
            .map(|(_, hit)| hit)
            .filter(|hit| hit.right >= right)
            .cloned()
            .collect())
    }

    fn indexed_revision(&self) -> ProjectionResult<u64> {
        Ok(self.index.read().revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProjectionError;
    use serde_json::Value;

    fn hit(id: CategoryId, parent_id: CategoryId, left: i64, right: i64) -> IndexHit {
        IndexHit {
            id: Some(id),
            parent_id: Some(parent_id),
            tree_id: Some(1),
            left,
            right,
            payload: Value::from(format!("c{id}")),
        }
    }

    /// 1 [1,8] > 2 [2,5] > 3 [3,4]; 1 > 4 [6,7].
    fn seeded() -> InMemoryProjection {
        let projection = InMemoryProjection::new();
        projection
            .replace_all(
                vec![hit(1, 1, 1, 8), hit(2, 1, 2, 5), hit(3, 2, 3, 4), hit(4, 1, 6, 7)],
                5,
            )
            .unwrap();
        projection
    }

    fn ids(hits: Vec<IndexHit>) -> Vec<CategoryId> {
        hits.into_iter().filter_map(|h| h.id).collect()
    }

    #[test]
    fn test_reads() {
        let projection = seeded();
        assert_eq!(projection.len(), 4);
        assert_eq!(projection.indexed_revision().unwrap(), 5);
        assert_eq!(projection.get(3).unwrap().map(|h| h.left), Some(3));
        assert!(projection.get(9).unwrap().is_none());
        assert_eq!(ids(projection.children_of(1).unwrap()), vec![2, 4]);
        assert!(projection.children_of(9).unwrap().is_empty());
        assert_eq!(ids(projection.range(1, 2, 5).unwrap()), vec![2, 3]);
        assert_eq!(ids(projection.ancestors_of(1, 3, 4).unwrap()), vec![1, 2, 3]);
        assert!(projection.range(2, 1, 8).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_moves_document() {
        let projection = seeded();
        projection.upsert(hit(4, 1, 9, 10)).unwrap();
        assert_eq!(projection.len(), 4);
        assert_eq!(projection.get(4).unwrap().map(|h| h.left), Some(9));
        assert_eq!(ids(projection.range(1, 6, 7).unwrap()), Vec::<CategoryId>::new());
    }

    #[test]
    fn test_incomplete_hits_rejected() {
        let projection = seeded();
        let mut anonymous = hit(5, 1, 9, 10);
        anonymous.id = None;
        assert!(matches!(
            projection.replace_all(vec![anonymous], 6),
            Err(ProjectionError::MissingField("id"))
        ));
        assert_eq!(projection.indexed_revision().unwrap(), 5);
        assert_eq!(projection.len(), 4);
    }
}
