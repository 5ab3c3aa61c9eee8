//! Relational nested-set engine backed by SQLite.
//!
//! Boundaries live in the `category` table and every structural mutation is
//! a short sequence of range `UPDATE`s inside one `BEGIN IMMEDIATE`
//! transaction, run while the advisory locks of the touched trees are held.
//!
//! ```text
//!  mutation ──► pooled connection ──► tree ids ──► tree locks ──► BEGIN IMMEDIATE
//!                                                                   │
//!       publish ◄── release locks ◄── COMMIT ◄── revision+1 ◄── verify ◄── body
//! ```
//!
//! Reads run in a deferred transaction on their own pooled connection. With
//! WAL enabled they see the last committed state and never wait for writers.

mod nested_set;
mod schema;

use std::path::Path;
use std::time::Duration;

use catalog_tree::{check_forest, check_tree, CategoryId, CategoryName, CategoryNode, NewCategory};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::config::StoreConfig;
use crate::context::OperationContext;
use crate::error::{StoreError, StoreResult};
use crate::events::{EventBus, MutationEvent, MutationListener};
use crate::lock::TreeLockManager;
use crate::pool::ConnectionPool;
use crate::traits::{CategoryStore, StoreBackend};

use schema::COLUMNS;

/// Category store over a SQLite database.
///
/// # Example
///
/// ```rust
/// use catalog_store::{CategoryStore, SqliteCategoryStore, StoreConfig};
/// use catalog_tree::NewCategory;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteCategoryStore::open_in_memory(StoreConfig::default())?;
/// let root = store.insert_root(NewCategory::named("Electronics")?)?;
/// let phones = store.insert_child(root.id, NewCategory::named("Phones")?)?;
/// assert_eq!((phones.left, phones.right), (2, 3));
/// assert_eq!(store.get(root.id)?.right, 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqliteCategoryStore {
    pool: ConnectionPool,
    locks: TreeLockManager,
    events: EventBus,
    config: StoreConfig,
}

impl SqliteCategoryStore {
    /// Opens (and migrates) a file-backed database in WAL mode.
    ///
    /// # Arguments
    ///
    /// * `path` - Database file; created if missing
    /// * `config` - Pool size, timeouts and verification settings
    ///
    /// # Returns
    ///
    /// A store with `config.pool_size` open connections, each with the busy
    /// timeout applied, or `Backend` if the file cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let busy_timeout = config.busy_timeout;
        let pool = ConnectionPool::new(config.pool_size, || {
            let conn = Connection::open(&path)?;
            schema::configure(&conn, busy_timeout, true)?;
            Ok(conn)
        })?;
        info!(path = %path.display(), pool_size = pool.size(), "category store opened");
        Self::with_pool(pool, config)
    }

    /// Opens a private in-memory database with a single connection.
    pub fn open_in_memory(config: StoreConfig) -> StoreResult<Self> {
        let busy_timeout = config.busy_timeout;
        let pool = ConnectionPool::new(1, || {
            let conn = Connection::open_in_memory()?;
            schema::configure(&conn, busy_timeout, false)?;
            Ok(conn)
        })?;
        debug!("in-memory category store opened");
        Self::with_pool(pool, config)
    }

    fn with_pool(pool: ConnectionPool, config: StoreConfig) -> StoreResult<Self> {
        {
            let conn = pool.acquire(config.acquire_timeout)?;
            schema::migrate(&conn)?;
        }
        Ok(Self {
            pool,
            locks: TreeLockManager::new(),
            events: EventBus::new(),
            config,
        })
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The advisory lock registry shared by all mutations of this store.
    pub fn locks(&self) -> &TreeLockManager {
        &self.locks
    }

    /// Context used by the [`CategoryStore`] methods.
    pub fn default_context(&self) -> OperationContext {
        OperationContext::new().with_optional_timeout(self.config.mutation_timeout)
    }

    /// Checks every tree in the store. Meant for tests and offline audits.
    pub fn check_invariants(&self) -> StoreResult<()> {
        let nodes = self.read(|conn| {
            let sql = format!("SELECT {COLUMNS} FROM category ORDER BY tree_id, lft");
            schema::query_nodes(conn, &sql, [])
        })?;
        check_forest(&nodes)?;
        Ok(())
    }

    // =========================================================================
    // Mutations with an explicit context
    // =========================================================================

    /// [`insert_root`](CategoryStore::insert_root) under `ctx`.
    #[instrument(level = "debug", skip_all, fields(name = %new.name))]
    pub fn insert_root_with(&self, new: NewCategory, ctx: &OperationContext) -> StoreResult<CategoryNode> {
        ctx.checkpoint()?;
        let mut conn = self.pool.acquire(bounded(self.config.acquire_timeout, ctx))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = nested_set::insert_row(&tx, None, 1, 2, &new)?;
        let node = schema::require_node(&tx, id)?;
        let event = MutationEvent::Inserted {
            id,
            tree_id: id,
            revision: 0,
        };
        let event = self.commit(tx, ctx, Some(event))?;
        self.publish(event);
        debug!(id, "root inserted");
        Ok(node)
    }

    /// [`insert_child`](CategoryStore::insert_child) under `ctx`.
    #[instrument(level = "debug", skip(self, new, ctx), fields(name = %new.name))]
    pub fn insert_child_with(
        &self,
        parent_id: CategoryId,
        new: NewCategory,
        ctx: &OperationContext,
    ) -> StoreResult<CategoryNode> {
        self.run_locked(ctx, "insert_child", &[parent_id], |tx, ctx| {
            let parent = schema::require_node(tx, parent_id)?;
            let at = parent.right;
            nested_set::open_gap(tx, parent.tree_id, at, 2)?;
            ctx.checkpoint()?;
            let id = nested_set::insert_row(tx, Some((parent.id, parent.tree_id)), at, at + 1, &new)?;
            let node = schema::require_node(tx, id)?;
            let event = MutationEvent::Inserted {
                id,
                tree_id: parent.tree_id,
                revision: 0,
            };
            Ok((node, Some(event)))
        })
    }

    /// [`move_node`](CategoryStore::move_node) under `ctx`.
    #[instrument(level = "debug", skip(self, ctx))]
    pub fn move_node_with(
        &self,
        node_id: CategoryId,
        new_parent_id: CategoryId,
        ctx: &OperationContext,
    ) -> StoreResult<()> {
        self.run_locked(ctx, "move_node", &[node_id, new_parent_id], |tx, ctx| {
            let node = schema::require_node(tx, node_id)?;
            let target = schema::require_node(tx, new_parent_id)?;

            let inside = target.tree_id == node.tree_id
                && node.left <= target.left
                && target.left <= node.right;
            if target.id == node.id || inside {
                return Err(StoreError::Cycle {
                    node: node_id,
                    target: new_parent_id,
                });
            }
            if !node.is_root() && node.parent_id == target.id {
                debug!(node_id, "already under target; nothing to move");
                return Ok(((), None));
            }

            let width = node.right - node.left + 1;
            let (from_tree, to_tree) = (node.tree_id, target.tree_id);

            let detached = nested_set::detach(tx, from_tree, node.left, node.right)?;
            ctx.checkpoint()?;
            nested_set::close_gap(tx, from_tree, node.right, width)?;
            ctx.checkpoint()?;
            // The target may sit after the closed gap.
            let at = nested_set::right_of(tx, target.id)?;
            nested_set::open_gap(tx, to_tree, at, width)?;
            ctx.checkpoint()?;
            let reattached = nested_set::reattach(tx, from_tree, to_tree, at - node.left)?;
            debug_assert_eq!(detached, reattached);
            nested_set::set_parent(tx, node.id, target.id)?;

            let event = MutationEvent::Moved {
                id: node.id,
                from_tree,
                to_tree,
                revision: 0,
            };
            Ok(((), Some(event)))
        })
    }

    /// [`remove`](CategoryStore::remove) under `ctx`.
    #[instrument(level = "debug", skip(self, ctx))]
    pub fn remove_with(&self, node_id: CategoryId, ctx: &OperationContext) -> StoreResult<()> {
        self.run_locked(ctx, "remove", &[node_id], |tx, ctx| {
            let node = schema::require_node(tx, node_id)?;
            let width = node.right - node.left + 1;
            let count = nested_set::delete_range(tx, node.tree_id, node.left, node.right)?;
            ctx.checkpoint()?;
            nested_set::close_gap(tx, node.tree_id, node.right, width)?;
            let event = MutationEvent::Removed {
                id: node.id,
                tree_id: node.tree_id,
                count,
                revision: 0,
            };
            Ok(((), Some(event)))
        })
    }

    /// [`rename`](CategoryStore::rename) under `ctx`.
    #[instrument(level = "debug", skip(self, name, ctx), fields(name = %name))]
    pub fn rename_with(
        &self,
        node_id: CategoryId,
        name: CategoryName,
        ctx: &OperationContext,
    ) -> StoreResult<CategoryNode> {
        self.run_locked(ctx, "rename", &[node_id], |tx, _ctx| {
            if !schema::update_name(tx, node_id, &name)? {
                return Err(StoreError::NotFound(node_id));
            }
            let node = schema::require_node(tx, node_id)?;
            let event = MutationEvent::Updated {
                id: node.id,
                tree_id: node.tree_id,
                revision: 0,
            };
            Ok((node, Some(event)))
        })
    }

    /// [`update_details`](CategoryStore::update_details) under `ctx`.
    #[instrument(level = "debug", skip(self, description, icon, ctx))]
    pub fn update_details_with(
        &self,
        node_id: CategoryId,
        description: Option<String>,
        icon: Option<String>,
        ctx: &OperationContext,
    ) -> StoreResult<CategoryNode> {
        self.run_locked(ctx, "update_details", &[node_id], |tx, _ctx| {
            if !schema::update_details(tx, node_id, description.as_deref(), icon.as_deref())? {
                return Err(StoreError::NotFound(node_id));
            }
            let node = schema::require_node(tx, node_id)?;
            let event = MutationEvent::Updated {
                id: node.id,
                tree_id: node.tree_id,
                revision: 0,
            };
            Ok((node, Some(event)))
        })
    }

    // =========================================================================
    // Transaction plumbing
    // =========================================================================

    /// Runs `body` in an immediate transaction while holding the locks of
    /// every tree that `subjects` belong to.
    ///
    /// Tree ids are looked up on a short-lived connection, then the locks are
    /// taken, and only then is a connection held for the transaction. A
    /// caller waiting on a busy tree therefore never keeps a connection from
    /// readers or from writers on other trees. If a concurrent move changed
    /// the tree ids in between, the attempt is abandoned and retried.
    fn run_locked<T, F>(
        &self,
        ctx: &OperationContext,
        op: &'static str,
        subjects: &[CategoryId],
        mut body: F,
    ) -> StoreResult<T>
    where
        F: FnMut(&Connection, &OperationContext) -> StoreResult<(T, Option<MutationEvent>)>,
    {
        let attempts = self.config.lock_retries.max(1);
        let mut contested = None;
        for attempt in 1..=attempts {
            ctx.checkpoint()?;
            let trees = {
                let conn = self.pool.acquire(bounded(self.config.acquire_timeout, ctx))?;
                schema::tree_ids_of(&conn, subjects)?
            };
            let guard = self
                .locks
                .acquire_with(&trees, bounded(self.config.lock_timeout, ctx), ctx)?;

            let mut conn = self.pool.acquire(bounded(self.config.acquire_timeout, ctx))?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = schema::tree_ids_of(&tx, subjects)?;
            if let Some(&moved) = current.iter().find(|tree_id| !guard.holds(**tree_id)) {
                debug!(op, attempt, ?trees, ?current, "tree changed before lock; retrying");
                contested = Some(moved);
                continue;
            }

            let (value, event) = body(&tx, ctx)?;
            let event = self.commit(tx, ctx, event)?;
            drop(conn);
            drop(guard);
            if let Some(event) = event {
                debug!(op, revision = event.revision(), "mutation committed");
                self.events.publish(&event);
            }
            return Ok(value);
        }

        let tree_id = contested.unwrap_or_default();
        warn!(op, attempts, tree_id, "gave up after repeated tree changes");
        Err(StoreError::ConcurrentModification {
            tree_id,
            waited: Duration::ZERO,
        })
    }

    /// Verifies, bumps the revision and commits. Returns the stamped event.
    /// An event of `None` commits without counting as a mutation.
    fn commit(
        &self,
        tx: Transaction<'_>,
        ctx: &OperationContext,
        event: Option<MutationEvent>,
    ) -> StoreResult<Option<MutationEvent>> {
        let Some(event) = event else {
            tx.commit()?;
            return Ok(None);
        };
        if self.config.verify_invariants {
            for tree_id in event.affected_trees() {
                let rows = schema::load_tree(&tx, tree_id)?;
                // Removed or merged away.
                if rows.is_empty() {
                    continue;
                }
                if let Err(violation) = check_tree(tree_id, &rows) {
                    error!(tree_id, %violation, "nested-set invariant broken; rolling back");
                    return Err(StoreError::ConsistencyViolation(violation));
                }
            }
        }
        ctx.checkpoint()?;
        let revision = schema::bump_revision(&tx)?;
        tx.commit()?;
        Ok(Some(event.stamp(revision)))
    }

    fn publish(&self, event: Option<MutationEvent>) {
        if let Some(event) = event {
            self.events.publish(&event);
        }
    }

    /// Runs `f` against a consistent snapshot.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = self.pool.acquire(self.config.acquire_timeout)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// `limit`, shortened to whatever is left of the context's deadline.
fn bounded(limit: Duration, ctx: &OperationContext) -> Duration {
    ctx.remaining().map_or(limit, |remaining| remaining.min(limit))
}

impl CategoryStore for SqliteCategoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::RelationalNestedSet
    }

    fn insert_root(&self, new: NewCategory) -> StoreResult<CategoryNode> {
        self.insert_root_with(new, &self.default_context())
    }

    fn insert_child(&self, parent_id: CategoryId, new: NewCategory) -> StoreResult<CategoryNode> {
        self.insert_child_with(parent_id, new, &self.default_context())
    }

    fn move_node(&self, node_id: CategoryId, new_parent_id: CategoryId) -> StoreResult<()> {
        self.move_node_with(node_id, new_parent_id, &self.default_context())
    }

    fn remove(&self, node_id: CategoryId) -> StoreResult<()> {
        self.remove_with(node_id, &self.default_context())
    }

    fn rename(&self, node_id: CategoryId, name: CategoryName) -> StoreResult<CategoryNode> {
        self.rename_with(node_id, name, &self.default_context())
    }

    fn update_details(
        &self,
        node_id: CategoryId,
        description: Option<String>,
        icon: Option<String>,
    ) -> StoreResult<CategoryNode> {
        self.update_details_with(node_id, description, icon, &self.default_context())
    }

    fn find_by_id(&self, id: CategoryId) -> StoreResult<Option<CategoryNode>> {
        self.read(|conn| schema::load_node(conn, id))
    }

    fn find_root(&self, tree_id: CategoryId) -> StoreResult<Option<CategoryNode>> {
        self.read(|conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM category WHERE id = ?1 AND parent_id = ?1 AND tree_id = ?1"
            );
            Ok(schema::query_nodes(conn, &sql, params![tree_id])?.pop())
        })
    }

    fn find_roots(&self) -> StoreResult<Vec<CategoryNode>> {
        self.read(|conn| {
            let sql = format!("SELECT {COLUMNS} FROM category WHERE parent_id = id ORDER BY id");
            schema::query_nodes(conn, &sql, [])
        })
    }

    fn find_children(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        self.read(|conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM category WHERE parent_id = ?1 AND id <> ?1 ORDER BY lft"
            );
            schema::query_nodes(conn, &sql, params![id])
        })
    }

    fn find_descendants(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        self.read(|conn| {
            let node = schema::require_node(conn, id)?;
            let sql = format!(
                "SELECT {COLUMNS} FROM category WHERE tree_id = ?1 AND lft BETWEEN ?2 AND ?3 ORDER BY lft"
            );
            schema::query_nodes(conn, &sql, params![node.tree_id, node.left, node.right])
        })
    }

    fn find_ancestor_path(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        self.read(|conn| {
            let node = schema::require_node(conn, id)?;
            let sql = format!(
                "SELECT {COLUMNS} FROM category WHERE tree_id = ?1 AND lft <= ?2 AND rgt >= ?3 ORDER BY lft"
            );
            schema::query_nodes(conn, &sql, params![node.tree_id, node.left, node.right])
        })
    }

    fn find_siblings(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        self.read(|conn| {
            let node = schema::require_node(conn, id)?;
            if node.is_root() {
                return Ok(Vec::new());
            }
            let sql = format!(
                "SELECT {COLUMNS} FROM category WHERE parent_id = ?1 AND id <> ?1 AND id <> ?2 ORDER BY lft"
            );
            schema::query_nodes(conn, &sql, params![node.parent_id, node.id])
        })
    }

    fn depth(&self, id: CategoryId) -> StoreResult<usize> {
        self.read(|conn| {
            let node = schema::require_node(conn, id)?;
            let ancestors: i64 = conn.query_row(
                "SELECT COUNT(*) FROM category WHERE tree_id = ?1 AND lft < ?2 AND rgt > ?3",
                params![node.tree_id, node.left, node.right],
                |row| row.get(0),
            )?;
            Ok(ancestors.max(0) as usize)
        })
    }

    fn revision(&self) -> StoreResult<u64> {
        self.read(schema::current_revision)
    }

    fn subscribe(&self, listener: std::sync::Arc<dyn MutationListener>) {
        self.events.subscribe(listener);
    }
}
