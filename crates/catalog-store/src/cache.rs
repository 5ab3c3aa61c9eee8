//! Reconstructed-tree cache.
//!
//! Holds whole trees (as nested [`TreeNode`]s) keyed by tree id, with LRU
//! eviction and a TTL. The cache is owned by the caller, not by the store:
//! subscribe it to the store with [`CategoryStore::subscribe`] and every
//! committed mutation drops the trees it touched.
//!
//! ```text
//!   get_or_load(tree) ──hit──► Arc<TreeNode>
//!          │ miss
//!          ▼
//!   store.find_descendants(root) ──► reconstruct ──► put (unless invalidated meanwhile)
//! ```

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use catalog_tree::{reconstruct_nodes, CategoryId, CategoryNode, TreeNode};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::config::CacheConfig;
use crate::error::{StoreError, StoreResult};
use crate::events::{MutationEvent, MutationListener};
use crate::traits::CategoryStore;

/// Shared handle to a cached tree.
pub type CachedTree = Arc<TreeNode<CategoryNode>>;

#[derive(Debug, Clone)]
struct CacheEntry {
    tree: CachedTree,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// LRU + TTL cache of reconstructed trees.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use catalog_store::{CacheConfig, CategoryStore, EdgeCategoryStore, TreeCache};
/// use catalog_tree::NewCategory;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = EdgeCategoryStore::new();
/// let cache = Arc::new(TreeCache::new(CacheConfig::default()));
/// store.subscribe(cache.clone());
///
/// let root = store.insert_root(NewCategory::named("Electronics")?)?;
/// assert_eq!(cache.get_or_load(&store, root.id)?.len(), 1);
///
/// store.insert_child(root.id, NewCategory::named("Phones")?)?;
/// assert_eq!(cache.get_or_load(&store, root.id)?.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct TreeCache {
    inner: Mutex<LruCache<CategoryId, CacheEntry>>,
    ttl: Duration,
    /// Bumped on every invalidation; a load that raced one is not stored.
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl TreeCache {
    /// Creates a cache from `config`.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_capacity(config.max_trees, config.ttl)
    }

    /// Creates a cache holding at most `max_trees` trees for `ttl` each.
    pub fn with_capacity(max_trees: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_trees).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// A cached tree, unless absent or expired. Promotes it to MRU.
    pub fn get(&self, tree_id: CategoryId) -> Option<CachedTree> {
        let mut cache = self.inner.lock();
        let found = match cache
            .get(&tree_id)
            .map(|entry| (entry.is_expired(self.ttl), entry.tree.clone()))
        {
            Some((true, _)) => {
                cache.pop(&tree_id);
                None
            }
            Some((false, tree)) => Some(tree),
            None => None,
        };
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Stores a tree, evicting the least recently used one if full.
    pub fn put(&self, tree_id: CategoryId, tree: CachedTree) {
        self.inner.lock().put(
            tree_id,
            CacheEntry {
                tree,
                created_at: Instant::now(),
            },
        );
    }

    /// The cached tree, or the tree freshly read from `store`.
    ///
    /// On a miss the whole tree is read with one `find_descendants` on its
    /// root and rebuilt with [`reconstruct_nodes`]. The result is cached only
    /// if no invalidation arrived while it was loading.
    ///
    /// # Arguments
    ///
    /// * `store` - Store to load from on a miss; normally the one this cache
    ///   is subscribed to
    /// * `tree_id` - Id of the tree (its root's id)
    ///
    /// # Returns
    ///
    /// A shared handle to the nested tree, `NotFound` when `tree_id` names no
    /// tree, or whatever error the store's reads raise.
    pub fn get_or_load<S>(&self, store: &S, tree_id: CategoryId) -> StoreResult<CachedTree>
    where
        S: CategoryStore + ?Sized,
    {
        if let Some(tree) = self.get(tree_id) {
            return Ok(tree);
        }
        let generation = self.generation.load(Ordering::Acquire);
        let root = store.find_root(tree_id)?.ok_or(StoreError::NotFound(tree_id))?;
        let tree = reconstruct_nodes(store.find_descendants(root.id)?)
            .into_iter()
            .next()
            .map(Arc::new)
            .ok_or(StoreError::NotFound(tree_id))?;
        if self.generation.load(Ordering::Acquire) == generation {
            self.put(tree_id, tree.clone());
        } else {
            trace!(tree_id, "tree changed while loading; not caching");
        }
        Ok(tree)
    }

    /// Drops one tree.
    pub fn invalidate(&self, tree_id: CategoryId) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if self.inner.lock().pop(&tree_id).is_some() {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            trace!(tree_id, "cached tree invalidated");
        }
    }

    /// Drops everything.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.lock().clear();
    }

    /// Removes expired entries now instead of on next access.
    pub fn cleanup_expired(&self) {
        let mut cache = self.inner.lock();
        let expired: Vec<CategoryId> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(tree_id, _)| *tree_id)
            .collect();
        for tree_id in expired {
            cache.pop(&tree_id);
        }
    }

    /// True if `tree_id` is cached (expired or not), without touching LRU order.
    pub fn contains(&self, tree_id: CategoryId) -> bool {
        self.inner.lock().contains(&tree_id)
    }

    /// Number of cached trees, possibly including expired ones.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters and occupancy.
    pub fn stats(&self) -> CacheStats {
        let cache = self.inner.lock();
        let expired = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .count();
        CacheStats {
            cached_trees: cache.len(),
            expired_trees: expired,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl MutationListener for TreeCache {
    fn on_mutation(&self, event: &MutationEvent) {
        for tree_id in event.affected_trees() {
            self.invalidate(tree_id);
        }
    }
}

impl std::fmt::Debug for TreeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeCache")
            .field("trees", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Trees currently held.
    pub cached_trees: usize,
    /// Held trees past their TTL.
    pub expired_trees: usize,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Trees dropped because of a mutation or explicit invalidation.
    pub invalidations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeCategoryStore;
    use catalog_tree::NewCategory;
    use std::thread;

    fn named(name: &str) -> NewCategory {
        NewCategory::named(name).unwrap()
    }

    #[test]
    fn test_miss_then_hit() {
        let store = EdgeCategoryStore::new();
        let root = store.insert_root(named("Electronics")).unwrap();
        let cache = TreeCache::with_capacity(4, Duration::from_secs(60));

        let first = cache.get_or_load(&store, root.id).unwrap();
        let second = cache.get_or_load(&store, root.id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.cached_trees, 1);
    }

    #[test]
    fn test_mutation_invalidates_affected_trees_only() {
        let store = EdgeCategoryStore::new();
        let cache = Arc::new(TreeCache::with_capacity(4, Duration::from_secs(60)));
        store.subscribe(cache.clone());

        let a = store.insert_root(named("A")).unwrap();
        let b = store.insert_root(named("B")).unwrap();
        cache.get_or_load(&store, a.id).unwrap();
        cache.get_or_load(&store, b.id).unwrap();

        store.insert_child(a.id, named("A1")).unwrap();
        assert!(!cache.contains(a.id));
        assert!(cache.contains(b.id));
        assert_eq!(cache.get_or_load(&store, a.id).unwrap().len(), 2);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_cross_tree_move_invalidates_both() {
        let store = EdgeCategoryStore::new();
        let cache = Arc::new(TreeCache::new(CacheConfig::default()));
        store.subscribe(cache.clone());
        let a = store.insert_root(named("A")).unwrap();
        let child = store.insert_child(a.id, named("A1")).unwrap();
        let b = store.insert_root(named("B")).unwrap();
        cache.get_or_load(&store, a.id).unwrap();
        cache.get_or_load(&store, b.id).unwrap();

        store.move_node(child.id, b.id).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = TreeCache::with_capacity(4, Duration::from_millis(10));
        cache.put(1, Arc::new(TreeNode::new(1, 2, sample(1))));
        assert!(cache.get(1).is_some());
        thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.stats().expired_trees, 1);
        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = TreeCache::with_capacity(2, Duration::from_secs(60));
        cache.put(1, Arc::new(TreeNode::new(1, 2, sample(1))));
        cache.put(2, Arc::new(TreeNode::new(1, 2, sample(2))));
        let _ = cache.get(1);
        cache.put(3, Arc::new(TreeNode::new(1, 2, sample(3))));
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
    }

    #[test]
    fn test_unknown_tree() {
        let store = EdgeCategoryStore::new();
        let cache = TreeCache::new(CacheConfig::default());
        assert!(matches!(
            cache.get_or_load(&store, 9),
            Err(StoreError::NotFound(9))
        ));
    }

    fn sample(id: CategoryId) -> CategoryNode {
        CategoryNode {
            id,
            parent_id: id,
            tree_id: id,
            left: 1,
            right: 2,
            name: catalog_tree::CategoryName::new(format!("t{id}")).unwrap(),
            description: None,
            icon: None,
        }
    }
}
