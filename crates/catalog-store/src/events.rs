//! Mutation events published after commit.
//!
//! Caches and other derived views register a [`MutationListener`] with the
//! store and drop whatever they hold for the affected trees. Events are only
//! published for committed transactions; a rolled-back mutation emits
//! nothing.

use std::sync::Arc;

use catalog_tree::CategoryId;
use parking_lot::RwLock;

/// A committed change to the category forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationEvent {
    /// A node was inserted (new root or child).
    Inserted {
        /// New node.
        id: CategoryId,
        /// Tree it was inserted into.
        tree_id: CategoryId,
        /// Store revision after the commit.
        revision: u64,
    },
    /// A subtree was reparented, possibly into another tree.
    Moved {
        /// Root of the moved subtree.
        id: CategoryId,
        /// Tree it left.
        from_tree: CategoryId,
        /// Tree it joined.
        to_tree: CategoryId,
        /// Store revision after the commit.
        revision: u64,
    },
    /// A subtree was deleted.
    Removed {
        /// Root of the removed subtree.
        id: CategoryId,
        /// Tree it was removed from.
        tree_id: CategoryId,
        /// Number of rows deleted.
        count: usize,
        /// Store revision after the commit.
        revision: u64,
    },
    /// Payload columns changed; boundaries untouched.
    Updated {
        /// Updated node.
        id: CategoryId,
        /// Its tree.
        tree_id: CategoryId,
        /// Store revision after the commit.
        revision: u64,
    },
}

impl MutationEvent {
    /// Trees whose contents changed.
    pub fn affected_trees(&self) -> Vec<CategoryId> {
        match self {
            MutationEvent::Inserted { tree_id, .. }
            | MutationEvent::Removed { tree_id, .. }
            | MutationEvent::Updated { tree_id, .. } => vec![*tree_id],
            MutationEvent::Moved {
                from_tree, to_tree, ..
            } if from_tree == to_tree => vec![*from_tree],
            MutationEvent::Moved {
                from_tree, to_tree, ..
            } => vec![*from_tree, *to_tree],
        }
    }

    /// Store revision produced by the commit.
    pub fn revision(&self) -> u64 {
        match self {
            MutationEvent::Inserted { revision, .. }
            | MutationEvent::Moved { revision, .. }
            | MutationEvent::Removed { revision, .. }
            | MutationEvent::Updated { revision, .. } => *revision,
        }
    }

    /// Sets the revision once the commit has produced one.
    pub(crate) fn stamp(mut self, committed: u64) -> Self {
        match &mut self {
            MutationEvent::Inserted { revision, .. }
            | MutationEvent::Moved { revision, .. }
            | MutationEvent::Removed { revision, .. }
            | MutationEvent::Updated { revision, .. } => *revision = committed,
        }
        self
    }
}

/// Receives committed mutation events.
///
/// Called synchronously on the mutating thread after commit, so
/// implementations should be quick and must not call back into the store's
/// mutation methods.
pub trait MutationListener: Send + Sync {
    /// Handles one committed event.
    fn on_mutation(&self, event: &MutationEvent);
}

/// Listener registry owned by a store.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn MutationListener>>>,
}

impl EventBus {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn subscribe(&self, listener: Arc<dyn MutationListener>) {
        self.listeners.write().push(listener);
    }

    /// Delivers `event` to every listener.
    pub fn publish(&self, event: &MutationEvent) {
        for listener in self.listeners.read().iter() {
            listener.on_mutation(event);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// True when nobody listens.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}
