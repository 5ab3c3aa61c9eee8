//! Nested reads over a projection.
//!
//! [`ProjectionReader`] fetches flat hits and passes them through
//! [`reconstruct_nodes`], so callers get the same nested shapes the store's
//! `find_subtree` gives them. With a [`StalenessPolicy`] it first compares
//! the projection's revision with the store's and refuses to answer when
//! the projection lags too far.

use catalog_store::CategoryStore;
use catalog_tree::{reconstruct_nodes, CategoryId, TreeNode};
use tracing::warn;

use crate::error::{ProjectionError, ProjectionResult};
use crate::hit::IndexHit;
use crate::traits::SearchIndexProjection;

/// How far a projection may trail the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Largest accepted `current - indexed` revision difference.
    pub max_revision_lag: u64,
}

impl StalenessPolicy {
    /// Accepts a lag of at most `max_revision_lag` commits.
    pub fn new(max_revision_lag: u64) -> Self {
        Self { max_revision_lag }
    }

    /// Only an exactly current projection is accepted.
    pub fn strict() -> Self {
        Self::new(0)
    }

    /// Fails with `StaleProjection` when `indexed` trails `current` too far.
    pub fn check(&self, indexed: u64, current: u64) -> ProjectionResult<()> {
        if current.saturating_sub(indexed) > self.max_revision_lag {
            warn!(indexed, current, max_lag = self.max_revision_lag, "projection too stale");
            return Err(ProjectionError::StaleProjection {
                indexed,
                current,
                max_lag: self.max_revision_lag,
            });
        }
        Ok(())
    }
}

/// Reconstructing reader over a [`SearchIndexProjection`].
///
/// # Example
///
/// ```rust
/// use catalog_projection::{InMemoryProjection, ProjectionError, ProjectionReader, StalenessPolicy};
/// use catalog_store::{CategoryStore, EdgeCategoryStore};
/// use catalog_tree::NewCategory;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = EdgeCategoryStore::new();
/// let root = store.insert_root(NewCategory::named("Electronics")?)?;
/// let projection = InMemoryProjection::new();
/// projection.index_from_store(&store)?;
///
/// let reader = ProjectionReader::new(&projection).with_policy(StalenessPolicy::strict(), &store);
/// assert_eq!(reader.subtree(root.id)?.len(), 1);
///
/// store.insert_child(root.id, NewCategory::named("Phones")?)?;
/// assert!(matches!(reader.subtree(root.id), Err(ProjectionError::StaleProjection { .. })));
/// # Ok(())
/// # }
/// ```
pub struct ProjectionReader<'a, P: ?Sized> {
    projection: &'a P,
    freshness: Option<(StalenessPolicy, &'a dyn CategoryStore)>,
}

impl<'a, P> ProjectionReader<'a, P>
where
    P: SearchIndexProjection + ?Sized,
{
    /// A reader that never checks staleness.
    pub fn new(projection: &'a P) -> Self {
        Self {
            projection,
            freshness: None,
        }
    }

    /// Checks `policy` against `store`'s revision before every read.
    pub fn with_policy(mut self, policy: StalenessPolicy, store: &'a dyn CategoryStore) -> Self {
        self.freshness = Some((policy, store));
        self
    }

    /// Fails with `StaleProjection` if a policy is set and violated.
    pub fn ensure_fresh(&self) -> ProjectionResult<()> {
        let Some((policy, store)) = self.freshness else {
            return Ok(());
        };
        let current = store.revision()?;
        policy.check(self.projection.indexed_revision()?, current)
    }

    fn require(&self, id: CategoryId) -> ProjectionResult<IndexHit> {
        self.projection.get(id)?.ok_or(ProjectionError::NotFound(id))
    }

    /// `id` and everything indexed below it, as one nested tree.
    ///
    /// # Arguments
    ///
    /// * `id` - Category whose subtree is read. Its hit must carry `tree_id`.
    ///
    /// # Returns
    ///
    /// The subtree rebuilt from the indexed boundaries, or:
    /// - `StaleProjection` if a policy is set and the projection lags too far
    /// - `NotFound` if `id` is not indexed
    /// - `Inconsistent` if the indexed hits do not nest, as happens while an
    ///   index is only partly refreshed after a move
    pub fn subtree(&self, id: CategoryId) -> ProjectionResult<TreeNode<IndexHit>> {
        self.ensure_fresh()?;
        let top = self.require(id)?;
        let tree_id = top.require_tree_id()?;
        let hits = nested(self.projection.range(tree_id, top.left, top.right)?)?;
        reconstruct_nodes(hits)
            .into_iter()
            .next()
            .ok_or(ProjectionError::NotFound(id))
    }

    /// The root-to-`id` chain as a nested tree with one child per level.
    pub fn ancestor_path(&self, id: CategoryId) -> ProjectionResult<TreeNode<IndexHit>> {
        self.ensure_fresh()?;
        let bottom = self.require(id)?;
        let tree_id = bottom.require_tree_id()?;
        let hits = nested(self.projection.ancestors_of(tree_id, bottom.left, bottom.right)?)?;
        reconstruct_nodes(hits)
            .into_iter()
            .next()
            .ok_or(ProjectionError::NotFound(id))
    }

    /// Direct children of `id`, left to right, each as a one-node tree.
    pub fn children(&self, id: CategoryId) -> ProjectionResult<Vec<TreeNode<IndexHit>>> {
        self.ensure_fresh()?;
        let hits = sorted(self.projection.children_of(id)?);
        Ok(hits
            .into_iter()
            .map(|hit| TreeNode::new(hit.left, hit.right, hit))
            .collect())
    }
}

fn sorted(mut hits: Vec<IndexHit>) -> Vec<IndexHit> {
    hits.sort_by_key(|hit| hit.left);
    hits
}

/// Sorts `hits` and checks they form a proper nesting: non-empty intervals,
/// distinct lefts, and every hit either inside or after each open one.
fn nested(hits: Vec<IndexHit>) -> ProjectionResult<Vec<IndexHit>> {
    let hits = sorted(hits);
    let mut open: Vec<(i64, i64)> = Vec::new();
    let mut previous = (i64::MIN, i64::MIN);
    for hit in &hits {
        let (left, right) = (hit.left, hit.right);
        while open.last().is_some_and(|&(_, top_right)| top_right < left) {
            open.pop();
        }
        let container = open.last().copied().unwrap_or(previous);
        let escapes = open.last().is_some_and(|&(_, top_right)| right >= top_right);
        if left >= right || left == previous.0 || escapes {
            warn!(left, right, ?container, "projection hits do not nest");
            return Err(ProjectionError::Inconsistent {
                left,
                right,
                container_left: container.0,
                container_right: container.1,
            });
        }
        open.push((left, right));
        previous = (left, right);
    }
    Ok(hits)
}

impl<P: ?Sized> std::fmt::Debug for ProjectionReader<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionReader")
            .field("policy", &self.freshness.map(|(policy, _)| policy))
            .finish()
    }
}
