//! # catalog-store
//!
//! Transactional storage for a forest of nested-set category trees.
//!
//! This crate provides:
//! - **[`CategoryStore`]**: the store capability (mutations, range reads,
//!   revision counter, mutation events)
//! - **[`SqliteCategoryStore`]**: the relational engine. Boundaries are kept
//!   in a SQLite table and rewritten by range updates inside one immediate
//!   transaction per mutation
//! - **[`EdgeCategoryStore`]**: an in-memory adapter that keeps only parent
//!   edges and derives boundaries on read
//! - **[`TreeCache`]**: an LRU + TTL cache of reconstructed trees, kept fresh
//!   by subscribing it to a store
//! - **`AsyncCategoryStore`** (feature `async`): a Tokio front that cancels
//!   abandoned calls
//!
//! ## Concurrency
//!
//! Each structural mutation holds an advisory lock on every tree it touches
//! (both trees for a cross-tree move) until it commits or rolls back.
//! Mutations on disjoint trees proceed in parallel; reads never take tree
//! locks.
//!
//! ```text
//!   thread 1: move(7 → 12)   locks {tree 1, tree 9}
//!   thread 2: insert(under 40) locks {tree 33}        ← runs concurrently
//!   thread 3: remove(8)      locks {tree 1}           ← waits for thread 1
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use catalog_store::{CacheConfig, CategoryStore, SqliteCategoryStore, StoreConfig, TreeCache};
//! use catalog_tree::NewCategory;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteCategoryStore::open_in_memory(StoreConfig::default())?;
//! let cache = Arc::new(TreeCache::new(CacheConfig::default()));
//! store.subscribe(cache.clone());
//!
//! let electronics = store.insert_root(NewCategory::named("Electronics")?)?;
//! let phones = store.insert_child(electronics.id, NewCategory::named("Phones")?)?;
//! let laptops = store.insert_child(electronics.id, NewCategory::named("Laptops")?)?;
//!
//! store.move_node(laptops.id, phones.id)?;
//!
//! let tree = cache.get_or_load(&store, electronics.id)?;
//! assert_eq!(tree.depth(), 3);
//! assert_eq!(store.revision()?, 4);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

#[cfg(feature = "async")]
mod async_store;
pub mod cache;
pub mod config;
mod context;
mod edge;
pub mod error;
mod events;
mod lock;
mod pool;
mod sqlite;
mod traits;

#[cfg(feature = "async")]
pub use async_store::AsyncCategoryStore;
pub use cache::{CacheStats, CachedTree, TreeCache};
pub use config::{CacheConfig, StoreConfig, StoreConfigBuilder};
pub use context::{CancellationToken, OperationContext};
pub use edge::EdgeCategoryStore;
pub use error::{StoreError, StoreResult};
pub use events::{EventBus, MutationEvent, MutationListener};
pub use lock::{TreeLockGuard, TreeLockManager};
pub use pool::{ConnectionPool, PooledConnection};
pub use sqlite::SqliteCategoryStore;
pub use traits::{CategoryStore, StoreBackend};

/// Re-exported so callers need only one import for ids.
pub use catalog_tree::CategoryId;
