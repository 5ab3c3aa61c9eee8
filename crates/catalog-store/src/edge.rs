//! Graph-edge adapter.
//!
//! Stores only parent/child edges and derives `[left, right]` by a pre-order
//! walk of the tree each time a node is read. Mutations never renumber
//! anything, so writes are O(depth) while reads cost O(tree size).
//!
//! Child order is insertion order (moved subtrees go last) and ids are never
//! reused, so for the same sequence of operations this adapter reports the
//! same boundaries as [`SqliteCategoryStore`](crate::SqliteCategoryStore).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use catalog_tree::{CategoryId, CategoryName, CategoryNode, NewCategory};
use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::error::{StoreError, StoreResult};
use crate::events::{EventBus, MutationEvent, MutationListener};
use crate::traits::{CategoryStore, StoreBackend};

#[derive(Debug, Clone)]
struct Vertex {
    parent_id: CategoryId,
    tree_id: CategoryId,
    name: CategoryName,
    description: Option<String>,
    icon: Option<String>,
    children: Vec<CategoryId>,
}

#[derive(Debug, Default)]
struct Graph {
    vertices: HashMap<CategoryId, Vertex>,
    roots: BTreeSet<CategoryId>,
    last_id: CategoryId,
    revision: u64,
}

impl Graph {
    fn vertex(&self, id: CategoryId) -> StoreResult<&Vertex> {
        self.vertices.get(&id).ok_or(StoreError::NotFound(id))
    }

    fn vertex_mut(&mut self, id: CategoryId) -> StoreResult<&mut Vertex> {
        self.vertices.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    fn allocate(&mut self, parent: Option<(CategoryId, CategoryId)>, new: NewCategory) -> CategoryId {
        self.last_id += 1;
        let id = self.last_id;
        let (parent_id, tree_id) = parent.unwrap_or((id, id));
        self.vertices.insert(
            id,
            Vertex {
                parent_id,
                tree_id,
                name: new.name,
                description: new.description,
                icon: new.icon,
                children: Vec::new(),
            },
        );
        id
    }

    fn node(&self, id: CategoryId, left: i64) -> CategoryNode {
        let vertex = &self.vertices[&id];
        CategoryNode {
            id,
            parent_id: vertex.parent_id,
            tree_id: vertex.tree_id,
            left,
            right: 0,
            name: vertex.name.clone(),
            description: vertex.description.clone(),
            icon: vertex.icon.clone(),
        }
    }

    /// Every node of `tree_id` with boundaries, in pre-order.
    fn number(&self, tree_id: CategoryId) -> Vec<CategoryNode> {
        let mut out = Vec::new();
        if !self.roots.contains(&tree_id) {
            return out;
        }
        let mut counter = 1;
        out.push(self.node(tree_id, counter));
        // (vertex, next child index, slot in `out`)
        let mut stack = vec![(tree_id, 0usize, 0usize)];
        while let Some(top) = stack.last_mut() {
            let children = &self.vertices[&top.0].children;
            if let Some(&child) = children.get(top.1) {
                top.1 += 1;
                counter += 1;
                stack.push((child, 0, out.len()));
                out.push(self.node(child, counter));
            } else {
                let slot = top.2;
                stack.pop();
                counter += 1;
                out[slot].right = counter;
            }
        }
        out
    }

    /// `id`'s tree numbered, plus `id`'s position in it.
    fn locate(&self, id: CategoryId) -> StoreResult<(Vec<CategoryNode>, usize)> {
        let tree = self.number(self.vertex(id)?.tree_id);
        let position = tree
            .iter()
            .position(|node| node.id == id)
            .ok_or(StoreError::NotFound(id))?;
        Ok((tree, position))
    }

    /// True if `candidate` is `ancestor` or lies below it.
    fn is_within(&self, candidate: CategoryId, ancestor: CategoryId) -> bool {
        let mut current = candidate;
        loop {
            if current == ancestor {
                return true;
            }
            match self.vertices.get(&current) {
                Some(vertex) if vertex.parent_id != current => current = vertex.parent_id,
                _ => return false,
            }
        }
    }

    fn subtree_ids(&self, id: CategoryId) -> Vec<CategoryId> {
        let mut ids = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            ids.push(current);
            if let Some(vertex) = self.vertices.get(&current) {
                pending.extend(vertex.children.iter().rev().copied());
            }
        }
        ids
    }

    /// Unlinks `id` from its parent (or from the root set).
    fn unlink(&mut self, id: CategoryId) -> StoreResult<()> {
        let parent_id = self.vertex(id)?.parent_id;
        if parent_id == id {
            self.roots.remove(&id);
        } else {
            self.vertex_mut(parent_id)?.children.retain(|child| *child != id);
        }
        Ok(())
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

/// In-memory [`CategoryStore`] that keeps edges instead of boundaries.
#[derive(Debug, Default)]
pub struct EdgeCategoryStore {
    graph: RwLock<Graph>,
    events: EventBus,
}

impl EdgeCategoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored categories across all trees.
    pub fn len(&self) -> usize {
        self.graph.read().vertices.len()
    }

    /// True when no category is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish(&self, event: MutationEvent) {
        self.events.publish(&event);
    }
}

impl CategoryStore for EdgeCategoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::GraphEdgeTraversal
    }

    #[instrument(level = "debug", skip_all, fields(name = %new.name))]
    fn insert_root(&self, new: NewCategory) -> StoreResult<CategoryNode> {
        let (node, event) = {
            let mut graph = self.graph.write();
            let id = graph.allocate(None, new);
            graph.roots.insert(id);
            let revision = graph.bump();
            let mut node = graph.node(id, 1);
            node.right = 2;
            let event = MutationEvent::Inserted {
                id,
                tree_id: id,
                revision,
            };
            (node, event)
        };
        self.publish(event);
        Ok(node)
    }

    #[instrument(level = "debug", skip(self, new), fields(name = %new.name))]
    fn insert_child(&self, parent_id: CategoryId, new: NewCategory) -> StoreResult<CategoryNode> {
        let (node, event) = {
            let mut graph = self.graph.write();
            let tree_id = graph.vertex(parent_id)?.tree_id;
            let id = graph.allocate(Some((parent_id, tree_id)), new);
            graph.vertex_mut(parent_id)?.children.push(id);
            let revision = graph.bump();
            let (tree, position) = graph.locate(id)?;
            let event = MutationEvent::Inserted {
                id,
                tree_id,
                revision,
            };
            (tree[position].clone(), event)
        };
        self.publish(event);
        Ok(node)
    }

    #[instrument(level = "debug", skip(self))]
    fn move_node(&self, node_id: CategoryId, new_parent_id: CategoryId) -> StoreResult<()> {
        let event = {
            let mut graph = self.graph.write();
            let node = graph.vertex(node_id)?;
            let (old_parent, from_tree) = (node.parent_id, node.tree_id);
            let to_tree = graph.vertex(new_parent_id)?.tree_id;

            if graph.is_within(new_parent_id, node_id) {
                return Err(StoreError::Cycle {
                    node: node_id,
                    target: new_parent_id,
                });
            }
            if old_parent != node_id && old_parent == new_parent_id {
                debug!(node_id, "already under target; nothing to move");
                return Ok(());
            }

            graph.unlink(node_id)?;
            graph.vertex_mut(new_parent_id)?.children.push(node_id);
            graph.vertex_mut(node_id)?.parent_id = new_parent_id;
            if from_tree != to_tree {
                for id in graph.subtree_ids(node_id) {
                    graph.vertex_mut(id)?.tree_id = to_tree;
                }
            }
            let revision = graph.bump();
            MutationEvent::Moved {
                id: node_id,
                from_tree,
                to_tree,
                revision,
            }
        };
        self.publish(event);
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn remove(&self, node_id: CategoryId) -> StoreResult<()> {
        let event = {
            let mut graph = self.graph.write();
            let tree_id = graph.vertex(node_id)?.tree_id;
            graph.unlink(node_id)?;
            let doomed = graph.subtree_ids(node_id);
            for id in &doomed {
                graph.vertices.remove(id);
            }
            let revision = graph.bump();
            MutationEvent::Removed {
                id: node_id,
                tree_id,
                count: doomed.len(),
                revision,
            }
        };
        self.publish(event);
        Ok(())
    }

    fn rename(&self, node_id: CategoryId, name: CategoryName) -> StoreResult<CategoryNode> {
        let (node, event) = {
            let mut graph = self.graph.write();
            graph.vertex_mut(node_id)?.name = name;
            let revision = graph.bump();
            let (tree, position) = graph.locate(node_id)?;
            let node = tree[position].clone();
            let event = MutationEvent::Updated {
                id: node_id,
                tree_id: node.tree_id,
                revision,
            };
            (node, event)
        };
        self.publish(event);
        Ok(node)
    }

    fn update_details(
        &self,
        node_id: CategoryId,
        description: Option<String>,
        icon: Option<String>,
    ) -> StoreResult<CategoryNode> {
        let (node, event) = {
            let mut graph = self.graph.write();
            let vertex = graph.vertex_mut(node_id)?;
            vertex.description = description;
            vertex.icon = icon;
            let revision = graph.bump();
            let (tree, position) = graph.locate(node_id)?;
            let node = tree[position].clone();
            let event = MutationEvent::Updated {
                id: node_id,
                tree_id: node.tree_id,
                revision,
            };
            (node, event)
        };
        self.publish(event);
        Ok(node)
    }

    fn find_by_id(&self, id: CategoryId) -> StoreResult<Option<CategoryNode>> {
        let graph = self.graph.read();
        match graph.locate(id) {
            Ok((mut tree, position)) => Ok(Some(tree.swap_remove(position))),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn find_root(&self, tree_id: CategoryId) -> StoreResult<Option<CategoryNode>> {
        Ok(self.graph.read().number(tree_id).into_iter().next())
    }

    fn find_roots(&self) -> StoreResult<Vec<CategoryNode>> {
        let graph = self.graph.read();
        Ok(graph
            .roots
            .iter()
            .filter_map(|root| graph.number(*root).into_iter().next())
            .collect())
    }

    fn find_children(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        let graph = self.graph.read();
        let Ok((tree, _)) = graph.locate(id) else {
            return Ok(Vec::new());
        };
        Ok(tree
            .into_iter()
            .filter(|node| node.parent_id == id && node.id != id)
            .collect())
    }

    fn find_descendants(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        let graph = self.graph.read();
        let (mut tree, position) = graph.locate(id)?;
        let right = tree[position].right;
        tree.drain(..position);
        tree.retain(|node| node.left <= right);
        Ok(tree)
    }

    fn find_ancestor_path(&self, id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
        let graph = self.graph.read();
        let (tree, position) = graph.locate(id)?;
        let (left, right) = tree[position].bounds();
        Ok(tree
            .into_iter()
            .take(position + 1)
            .filter(|node| node.left <= left && node.right >= right)
            .collect())
    }

    fn revision(&self) -> StoreResult<u64> {
        Ok(self.graph.read().revision)
    }

    fn subscribe(&self, listener: Arc<dyn MutationListener>) {
        self.events.subscribe(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_tree::check_tree;

    fn named(name: &str) -> NewCategory {
        NewCategory::named(name).unwrap()
    }

    fn bounds(store: &EdgeCategoryStore, id: CategoryId) -> (CategoryId, i64, i64) {
        let node = store.get(id).unwrap();
        (node.tree_id, node.left, node.right)
    }

    #[test]
    fn test_numbering_follows_insertion_order() {
        let store = EdgeCategoryStore::new();
        let root = store.insert_root(named("Electronics")).unwrap();
        let phones = store.insert_child(root.id, named("Phones")).unwrap();
        let laptops = store.insert_child(root.id, named("Laptops")).unwrap();
        let smart = store.insert_child(phones.id, named("Smartphones")).unwrap();

        assert_eq!((smart.left, smart.right), (3, 4));
        assert_eq!(bounds(&store, root.id), (root.id, 1, 8));
        assert_eq!(bounds(&store, phones.id), (root.id, 2, 5));
        assert_eq!(bounds(&store, laptops.id), (root.id, 6, 7));
        assert_eq!(check_tree(root.id, &store.find_descendants(root.id).unwrap()), Ok(()));
    }

    #[test]
    fn test_move_across_trees_retags_subtree() {
        let store = EdgeCategoryStore::new();
        let root = store.insert_root(named("Electronics")).unwrap();
        let phones = store.insert_child(root.id, named("Phones")).unwrap();
        let smart = store.insert_child(phones.id, named("Smartphones")).unwrap();
        let home = store.insert_root(named("Home")).unwrap();

        store.move_node(phones.id, home.id).unwrap();

        assert_eq!(bounds(&store, root.id), (root.id, 1, 2));
        assert_eq!(bounds(&store, phones.id), (home.id, 2, 5));
        assert_eq!(bounds(&store, smart.id), (home.id, 3, 4));
        assert_eq!(store.revision().unwrap(), 5);
    }

    #[test]
    fn test_move_root_merges_tree() {
        let store = EdgeCategoryStore::new();
        let a = store.insert_root(named("A")).unwrap();
        let b = store.insert_root(named("B")).unwrap();
        store.move_node(a.id, b.id).unwrap();
        assert!(store.find_root(a.id).unwrap().is_none());
        assert_eq!(store.find_roots().unwrap().len(), 1);
        assert_eq!(bounds(&store, a.id), (b.id, 2, 3));
    }

    #[test]
    fn test_cycle_and_noop() {
        let store = EdgeCategoryStore::new();
        let root = store.insert_root(named("Electronics")).unwrap();
        let phones = store.insert_child(root.id, named("Phones")).unwrap();
        assert!(matches!(
            store.move_node(root.id, phones.id),
            Err(StoreError::Cycle { .. })
        ));
        store.move_node(phones.id, root.id).unwrap();
        assert_eq!(store.revision().unwrap(), 2);
    }

    #[test]
    fn test_remove_and_reads() {
        let store = EdgeCategoryStore::new();
        let root = store.insert_root(named("Electronics")).unwrap();
        let phones = store.insert_child(root.id, named("Phones")).unwrap();
        store.insert_child(phones.id, named("Smartphones")).unwrap();
        let laptops = store.insert_child(root.id, named("Laptops")).unwrap();

        assert_eq!(store.depth(laptops.id).unwrap(), 1);
        assert_eq!(store.find_siblings(laptops.id).unwrap()[0].id, phones.id);

        store.remove(phones.id).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(bounds(&store, laptops.id), (root.id, 2, 3));
        assert!(store.find_by_id(phones.id).unwrap().is_none());
        assert!(store.find_children(phones.id).unwrap().is_empty());

        // Ids are never reused.
        let tablets = store.insert_child(root.id, named("Tablets")).unwrap();
        assert_eq!(tablets.id, 5);
    }
}
