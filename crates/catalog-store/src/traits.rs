//! The category store capability.
//!
//! [`CategoryStore`] is implemented by the relational nested-set engine
//! ([`SqliteCategoryStore`](crate::SqliteCategoryStore)) and by the
//! edge-traversal adapter ([`EdgeCategoryStore`](crate::EdgeCategoryStore)).
//! Both produce the same observable boundaries for the same sequence of
//! operations; callers pick one by storage, not by semantics.
//!
//! # Example
//!
//! ```rust
//! use catalog_store::{CategoryStore, EdgeCategoryStore};
//! use catalog_tree::NewCategory;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = EdgeCategoryStore::new();
//! let electronics = store.insert_root(NewCategory::named("Electronics")?)?;
//! let phones = store.insert_child(electronics.id, NewCategory::named("Phones")?)?;
//!
//! let path = store.find_ancestor_path(phones.id)?;
//! assert_eq!(path.len(), 2);
//! assert_eq!(store.depth(phones.id)?, 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use catalog_tree::{reconstruct_nodes, CategoryId, CategoryName, CategoryNode, NewCategory, TreeNode};

use crate::error::{StoreError, StoreResult};
use crate::events::MutationListener;

/// Which persistence strategy backs a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreBackend {
    /// Interval boundaries stored in a relational table.
    RelationalNestedSet,
    /// Parent/child edges; intervals derived by traversal on read.
    GraphEdgeTraversal,
}

/// Read and write access to a forest of category trees.
///
/// # Mutations
///
/// Every mutation is atomic: it either commits with all nested-set
/// invariants intact or has no effect. Preconditions (existence, cycles) are
/// checked before anything is written.
///
/// # Reads
///
/// Reads never block on mutations and observe each mutation either entirely
/// or not at all. Range reads return nodes in ascending `left` order, which
/// is pre-order and can be fed straight into
/// [`reconstruct`](catalog_tree::reconstruct).
pub trait CategoryStore: Send + Sync {
    /// The persistence strategy behind this store.
    fn backend(&self) -> StoreBackend;

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Creates a new tree whose root spans `[1, 2]`.
    fn insert_root(&self, new: NewCategory) -> StoreResult<CategoryNode>;

    /// Appends a node as the last child of `parent_id`.
    ///
    /// Fails with `NotFound` if the parent does not exist.
    fn insert_child(&self, parent_id: CategoryId, new: NewCategory) -> StoreResult<CategoryNode>;

    /// Reparents `node_id` (and its subtree) as the last child of
    /// `new_parent_id`, possibly in another tree.
    ///
    /// - `Cycle` when the target is the node itself or inside its subtree.
    /// - No-op when the target already is the parent.
    fn move_node(&self, node_id: CategoryId, new_parent_id: CategoryId) -> StoreResult<()>;

    /// Deletes `node_id` and its whole subtree. Removing a root drops the tree.
    fn remove(&self, node_id: CategoryId) -> StoreResult<()>;

    /// Replaces a node's name. Boundaries are untouched.
    fn rename(&self, node_id: CategoryId, name: CategoryName) -> StoreResult<CategoryNode>;

    /// Replaces a node's description and icon. Boundaries are untouched.
    fn update_details(
        &self,
        node_id: CategoryId,
        description: Option<String>,
        icon: Option<String>,
    ) -> StoreResult<CategoryNode>;

    // =========================================================================
    // Reads
    // =========================================================================

    /// Looks a node up by id.
    fn find_by_id(&self, id: CategoryId) -> StoreResult<Option<CategoryNode>>;

    /// The root of tree `tree_id`, if the tree exists.
    fn find_root(&self, tree_id: CategoryId) -> StoreResult<Option<CategoryNode>>;

    /// Every root, ascending id.
    fn find_roots(&self) -> StoreResult<Vec<CategoryNode>>;

    /// Direct children of `id`, left to right. Empty for leaves and unknown ids.
    fn find_children(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>>;

    /// `id` followed by all of its descendants, in pre-order.
    fn find_descendants(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>>;

    /// Root-first chain from the tree's root down to `id` inclusive.
    fn find_ancestor_path(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>>;

    /// Number of committed mutations so far.
    fn revision(&self) -> StoreResult<u64>;

    /// Registers a listener for committed mutations.
    fn subscribe(&self, listener: Arc<dyn MutationListener>);

    // =========================================================================
    // Provided
    // =========================================================================

    /// Looks a node up by id, failing with `NotFound`.
    fn get(&self, id: CategoryId) -> StoreResult<CategoryNode> {
        self.find_by_id(id)?.ok_or(StoreError::NotFound(id))
    }

    /// Children of `id`'s parent other than `id`. Roots have no siblings.
    fn find_siblings(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        let node = self.get(id)?;
        if node.is_root() {
            return Ok(Vec::new());
        }
        let mut siblings = self.find_children(node.parent_id)?;
        siblings.retain(|sibling| sibling.id != id);
        Ok(siblings)
    }

    /// Number of ancestors of `id`; a root has depth 0.
    fn depth(&self, id: CategoryId) -> StoreResult<usize> {
        Ok(self.find_ancestor_path(id)?.len().saturating_sub(1))
    }

    /// `id`'s subtree as a nested tree.
    fn find_subtree(&self, id: CategoryId) -> StoreResult<TreeNode<CategoryNode>> {
        reconstruct_nodes(self.find_descendants(id)?)
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound(id))
    }
}
