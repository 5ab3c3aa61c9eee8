//! Per-tree advisory locks.
//!
//! Every structural mutation holds an exclusive lock on each tree it touches
//! for as long as its transaction is open. Locks on different trees never
//! contend, so mutations on disjoint trees run in parallel.
//!
//! A caller asks for all of its trees at once and gets either all of them or
//! none, so two movers locking `{A, B}` and `{B, A}` cannot deadlock.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use catalog_tree::CategoryId;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::context::OperationContext;
use crate::error::{StoreError, StoreResult};

/// How often a waiting caller re-checks its context.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Registry of currently locked tree ids.
#[derive(Debug, Default)]
pub struct TreeLockManager {
    held: Mutex<BTreeSet<CategoryId>>,
    released: Condvar,
}

impl TreeLockManager {
    /// Creates an empty lock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every tree in `tree_ids`, waiting at most `timeout`.
    ///
    /// Duplicate ids are fine. Fails with `ConcurrentModification` naming the
    /// first still-held tree when the wait expires.
    pub fn acquire(
        &self,
        tree_ids: &[CategoryId],
        timeout: Duration,
    ) -> StoreResult<TreeLockGuard<'_>> {
        self.acquire_with(tree_ids, timeout, &OperationContext::new())
    }

    /// Like [`acquire`](Self::acquire), but gives up early when `ctx` is
    /// cancelled (`Cancelled`) or its deadline passes (`Timeout`).
    pub fn acquire_with(
        &self,
        tree_ids: &[CategoryId],
        timeout: Duration,
        ctx: &OperationContext,
    ) -> StoreResult<TreeLockGuard<'_>> {
        let wanted: BTreeSet<CategoryId> = tree_ids.iter().copied().collect();
        let started = Instant::now();
        let deadline = started + timeout;

        let mut held = self.held.lock();
        loop {
            let Some(tree_id) = wanted.iter().find(|id| held.contains(id)).copied() else {
                held.extend(wanted.iter().copied());
                trace!(trees = ?wanted, "tree locks acquired");
                return Ok(TreeLockGuard {
                    manager: self,
                    tree_ids: wanted,
                });
            };
            if let Some(err) = ctx.interrupted() {
                debug!(tree_id, %err, "stopped waiting for tree lock");
                return Err(err);
            }
            let now = Instant::now();
            if now >= deadline {
                let waited = started.elapsed();
                warn!(tree_id, ?waited, "tree lock wait timed out");
                return Err(StoreError::ConcurrentModification { tree_id, waited });
            }
            // Cancellation does not signal the condvar, so wake up now and then.
            self.released
                .wait_until(&mut held, deadline.min(now + CANCEL_POLL_INTERVAL));
        }
    }

    /// True while any guard holds `tree_id`.
    pub fn is_locked(&self, tree_id: CategoryId) -> bool {
        self.held.lock().contains(&tree_id)
    }

    fn release(&self, tree_ids: &BTreeSet<CategoryId>) {
        let mut held = self.held.lock();
        for id in tree_ids {
            held.remove(id);
        }
        drop(held);
        self.released.notify_all();
        trace!(trees = ?tree_ids, "tree locks released");
    }
}

/// RAII guard; releases its trees when dropped on any exit path.
#[derive(Debug)]
pub struct TreeLockGuard<'a> {
    manager: &'a TreeLockManager,
    tree_ids: BTreeSet<CategoryId>,
}

impl TreeLockGuard<'_> {
    /// Trees held by this guard, ascending.
    pub fn tree_ids(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.tree_ids.iter().copied()
    }

    /// True when this guard holds `tree_id`.
    pub fn holds(&self, tree_id: CategoryId) -> bool {
        self.tree_ids.contains(&tree_id)
    }
}

impl Drop for TreeLockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(&self.tree_ids);
    }
}
