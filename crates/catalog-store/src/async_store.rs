//! Tokio adapter for [`SqliteCategoryStore`].
//!
//! Every call runs on the blocking thread pool. If the returned future is
//! dropped before it completes (a `select!` loses, a timeout fires, the
//! request is aborted), the operation's cancellation token is tripped and
//! the mutation rolls back at its next checkpoint.

use std::sync::Arc;

use catalog_tree::{CategoryId, CategoryName, CategoryNode, NewCategory, TreeNode};

use crate::context::{CancellationToken, OperationContext};
use crate::error::{StoreError, StoreResult};
use crate::sqlite::SqliteCategoryStore;
use crate::traits::CategoryStore;

/// Cancels the token unless disarmed first.
struct CancelOnDrop {
    token: CancellationToken,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("async store call abandoned; cancelling");
            self.token.cancel();
        }
    }
}

/// Async front for a shared [`SqliteCategoryStore`].
#[derive(Debug, Clone)]
pub struct AsyncCategoryStore {
    inner: Arc<SqliteCategoryStore>,
}

impl AsyncCategoryStore {
    /// Wraps a shared store.
    pub fn new(inner: Arc<SqliteCategoryStore>) -> Self {
        Self { inner }
    }

    /// The wrapped synchronous store.
    pub fn blocking(&self) -> &Arc<SqliteCategoryStore> {
        &self.inner
    }

    async fn run<T, F>(&self, ctx: OperationContext, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteCategoryStore, &OperationContext) -> StoreResult<T> + Send + 'static,
    {
        let mut guard = CancelOnDrop {
            token: ctx.token().clone(),
            armed: true,
        };
        let store = Arc::clone(&self.inner);
        let joined = tokio::task::spawn_blocking(move || op(&store, &ctx)).await;
        guard.armed = false;
        joined.map_err(|err| StoreError::TaskJoin(err.to_string()))?
    }

    /// See [`CategoryStore::insert_root`].
    pub async fn insert_root(&self, new: NewCategory) -> StoreResult<CategoryNode> {
        let ctx = self.inner.default_context();
        self.run(ctx, move |store, ctx| store.insert_root_with(new, ctx))
            .await
    }

    /// See [`CategoryStore::insert_child`].
    pub async fn insert_child(&self, parent_id: CategoryId, new: NewCategory) -> StoreResult<CategoryNode> {
        let ctx = self.inner.default_context();
        self.run(ctx, move |store, ctx| store.insert_child_with(parent_id, new, ctx))
            .await
    }

    /// See [`CategoryStore::move_node`].
    pub async fn move_node(&self, node_id: CategoryId, new_parent_id: CategoryId) -> StoreResult<()> {
        self.move_node_with(node_id, new_parent_id, self.inner.default_context())
            .await
    }

    /// [`move_node`](Self::move_node) under a caller-supplied context.
    pub async fn move_node_with(
        &self,
        node_id: CategoryId,
        new_parent_id: CategoryId,
        ctx: OperationContext,
    ) -> StoreResult<()> {
        self.run(ctx, move |store, ctx| store.move_node_with(node_id, new_parent_id, ctx))
            .await
    }

    /// See [`CategoryStore::remove`].
    pub async fn remove(&self, node_id: CategoryId) -> StoreResult<()> {
        let ctx = self.inner.default_context();
        self.run(ctx, move |store, ctx| store.remove_with(node_id, ctx))
            .await
    }

    /// See [`CategoryStore::rename`].
    pub async fn rename(&self, node_id: CategoryId, name: CategoryName) -> StoreResult<CategoryNode> {
        let ctx = self.inner.default_context();
        self.run(ctx, move |store, ctx| store.rename_with(node_id, name, ctx))
            .await
    }

    /// See [`CategoryStore::update_details`].
    pub async fn update_details(
        &self,
        node_id: CategoryId,
        description: Option<String>,
        icon: Option<String>,
    ) -> StoreResult<CategoryNode> {
        let ctx = self.inner.default_context();
        self.run(ctx, move |store, ctx| {
            store.update_details_with(node_id, description, icon, ctx)
        })
        .await
    }

    /// See [`CategoryStore::find_by_id`].
    pub async fn find_by_id(&self, id: CategoryId) -> StoreResult<Option<CategoryNode>> {
        self.run(OperationContext::new(), move |store, _| store.find_by_id(id))
            .await
    }

    /// See [`CategoryStore::find_children`].
    pub async fn find_children(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        self.run(OperationContext::new(), move |store, _| store.find_children(id))
            .await
    }

    /// See [`CategoryStore::find_descendants`].
    pub async fn find_descendants(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        self.run(OperationContext::new(), move |store, _| store.find_descendants(id))
            .await
    }

    /// See [`CategoryStore::find_ancestor_path`].
    pub async fn find_ancestor_path(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        self.run(OperationContext::new(), move |store, _| store.find_ancestor_path(id))
            .await
    }

    /// See [`CategoryStore::find_subtree`].
    pub async fn find_subtree(&self, id: CategoryId) -> StoreResult<TreeNode<CategoryNode>> {
        self.run(OperationContext::new(), move |store, _| store.find_subtree(id))
            .await
    }

    /// See [`CategoryStore::revision`].
    pub async fn revision(&self) -> StoreResult<u64> {
        self.run(OperationContext::new(), |store, _| store.revision())
            .await
    }
}
