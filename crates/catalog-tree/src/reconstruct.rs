//! Reconstruction of nested trees from flat, interval-annotated records.
//!
//! A nested-set store (or a search index carrying the same boundaries) hands
//! back its rows as a flat list sorted by `left`. That order is a pre-order
//! walk, so the nesting can be rebuilt in a single pass with a stack of open
//! nodes, each waiting for its closing boundary (its `right`).
//!
//! The algorithm never looks at ids or parent pointers, only at `left` and
//! `right`, which makes it agnostic to where the records came from.

use crate::node::Interval;

// =============================================================================
// Records and nodes
// =============================================================================

/// A single flat record: boundaries plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlatRecord<T> {
    /// Left boundary.
    pub left: i64,
    /// Right boundary.
    pub right: i64,
    /// Caller payload.
    pub payload: T,
}

impl<T> FlatRecord<T> {
    /// Creates a record.
    pub fn new(left: i64, right: i64, payload: T) -> Self {
        Self {
            left,
            right,
            payload,
        }
    }
}

impl<T> Interval for FlatRecord<T> {
    fn left(&self) -> i64 {
        self.left
    }

    fn right(&self) -> i64 {
        self.right
    }
}

/// A reconstructed node with its direct children in left-to-right order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeNode<T> {
    /// Left boundary.
    pub left: i64,
    /// Right boundary.
    pub right: i64,
    /// Caller payload.
    pub payload: T,
    /// Direct children, ordered by `left`.
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    /// Creates a node without children.
    pub fn new(left: i64, right: i64, payload: T) -> Self {
        Self {
            left,
            right,
            payload,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including this node.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Always false: a node counts itself.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Height of the subtree; a lone node has depth 1.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            stack.extend(node.children.iter().map(|child| (child, depth + 1)));
        }
        max_depth
    }

    /// Pre-order iterator over this subtree.
    pub fn iter(&self) -> PreOrderIter<'_, T> {
        PreOrderIter { stack: vec![self] }
    }

    /// Finds the first node in pre-order whose payload satisfies `pred`.
    pub fn find<F>(&self, mut pred: F) -> Option<&TreeNode<T>>
    where
        F: FnMut(&T) -> bool,
    {
        self.iter().find(|node| pred(&node.payload))
    }

    /// Maps every payload, keeping structure and boundaries.
    ///
    /// `f` sees payloads in pre-order. The walk keeps its own stack, so
    /// arbitrarily deep trees are fine.
    pub fn map<U, F>(self, f: &mut F) -> TreeNode<U>
    where
        F: FnMut(T) -> U,
    {
        let mut stack = vec![self.open_mapped(f)];
        loop {
            let next = stack.last_mut().and_then(|(_, pending)| pending.next());
            match next {
                Some(child) => {
                    let frame = child.open_mapped(f);
                    stack.push(frame);
                }
                None if stack.len() > 1 => {
                    if let Some((done, _)) = stack.pop() {
                        if let Some((parent, _)) = stack.last_mut() {
                            parent.children.push(done);
                        }
                    }
                }
                None => break,
            }
        }
        // Only the root is left.
        stack.swap_remove(0).0
    }

    fn open_mapped<U, F>(self, f: &mut F) -> (TreeNode<U>, std::vec::IntoIter<TreeNode<T>>)
    where
        F: FnMut(T) -> U,
    {
        let TreeNode {
            left,
            right,
            payload,
            children,
        } = self;
        (TreeNode::new(left, right, f(payload)), children.into_iter())
    }
}

impl<T> Interval for TreeNode<T> {
    fn left(&self) -> i64 {
        self.left
    }

    fn right(&self) -> i64 {
        self.right
    }
}

/// Pre-order iterator returned by [`TreeNode::iter`].
pub struct PreOrderIter<'a, T> {
    stack: Vec<&'a TreeNode<T>>,
}

impl<'a, T> Iterator for PreOrderIter<'a, T> {
    type Item = &'a TreeNode<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reverse push keeps left-to-right order on pop.
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

// =============================================================================
// Reconstruction
// =============================================================================

/// Rebuilds nested trees from records sorted by ascending `left`.
///
/// Each returned node's `children` holds exactly the records directly
/// contained in it. The input may describe several trees (a forest) or any
/// pre-order slice of one, such as a subtree or an ancestor path.
///
/// Runs in O(n) time with O(depth) auxiliary space.
///
/// # Preconditions
///
/// - `left` is strictly ascending across the input.
/// - Every pair of intervals is disjoint or nested.
///
/// Violations are programming errors. They trip `debug_assert!`s in debug
/// builds; release builds do not check and the output is unspecified.
///
/// # Example
///
/// ```rust
/// use catalog_tree::{reconstruct, FlatRecord};
///
/// let forest = reconstruct(vec![
///     FlatRecord::new(1, 6, "Electronics"),
///     FlatRecord::new(2, 3, "Phones"),
///     FlatRecord::new(4, 5, "Laptops"),
/// ]);
/// assert_eq!(forest[0].children[1].payload, "Laptops");
/// ```
pub fn reconstruct<T, I>(records: I) -> Vec<TreeNode<T>>
where
    I: IntoIterator<Item = FlatRecord<T>>,
{
    let mut roots = Vec::new();
    // Open nodes; each closes once a record starts past its `right`.
    let mut open: Vec<TreeNode<T>> = Vec::new();
    let mut previous_left: Option<i64> = None;

    for record in records {
        debug_assert!(
            record.left < record.right,
            "record [{}, {}] has an empty interval",
            record.left,
            record.right
        );
        debug_assert!(
            previous_left.map_or(true, |prev| prev < record.left),
            "records are not in ascending left order: {:?} then {}",
            previous_left,
            record.left
        );
        previous_left = Some(record.left);

        while open.last().is_some_and(|top| top.right < record.left) {
            close_innermost(&mut open, &mut roots);
        }

        debug_assert!(
            open.last().map_or(true, |top| record.right < top.right),
            "record [{}, {}] partially overlaps its container",
            record.left,
            record.right
        );

        let node = TreeNode::new(record.left, record.right, record.payload);
        if node.right - node.left > 1 {
            open.push(node);
        } else {
            attach(&mut open, &mut roots, node);
        }
    }

    while !open.is_empty() {
        close_innermost(&mut open, &mut roots);
    }

    roots
}

/// Rebuilds nested trees from values that carry their own boundaries.
///
/// Convenience wrapper over [`reconstruct`] for rows such as
/// [`CategoryNode`](crate::CategoryNode). Same preconditions.
pub fn reconstruct_nodes<T, I>(items: I) -> Vec<TreeNode<T>>
where
    T: Interval,
    I: IntoIterator<Item = T>,
{
    reconstruct(
        items
            .into_iter()
            .map(|item| FlatRecord::new(item.left(), item.right(), item)),
    )
}

fn close_innermost<T>(open: &mut Vec<TreeNode<T>>, roots: &mut Vec<TreeNode<T>>) {
    if let Some(done) = open.pop() {
        attach(open, roots, done);
    }
}

fn attach<T>(open: &mut [TreeNode<T>], roots: &mut Vec<TreeNode<T>>, node: TreeNode<T>) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

// =============================================================================
// Flattening and numbering
// =============================================================================

/// Flattens a forest into records in pre-order (ascending `left`).
///
/// Inverse of [`reconstruct`]: `reconstruct(flatten_pre_order(&f)) == f`.
pub fn flatten_pre_order<T: Clone>(forest: &[TreeNode<T>]) -> Vec<FlatRecord<T>> {
    forest
        .iter()
        .flat_map(|root| root.iter())
        .map(|node| FlatRecord::new(node.left, node.right, node.payload.clone()))
        .collect()
}

/// A plain nested outline without boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline<T> {
    /// Caller payload.
    pub payload: T,
    /// Children in order.
    pub children: Vec<Outline<T>>,
}

impl<T> Outline<T> {
    /// A node without children.
    pub fn leaf(payload: T) -> Self {
        Self {
            payload,
            children: Vec::new(),
        }
    }

    /// A node with the given children.
    pub fn branch(payload: T, children: Vec<Outline<T>>) -> Self {
        Self { payload, children }
    }
}

/// Assigns nested-set numbering to a forest of outlines.
///
/// Every top-level outline is numbered independently starting at 1, the way
/// each tree of a multi-rooted store is.
pub fn number_forest<T>(outlines: Vec<Outline<T>>) -> Vec<TreeNode<T>> {
    outlines.into_iter().map(number_outline).collect()
}

fn number_outline<T>(outline: Outline<T>) -> TreeNode<T> {
    let mut counter = 1;
    // (node with its left set, children still to number)
    let mut stack = vec![(TreeNode::new(counter, 0, outline.payload), outline.children.into_iter())];
    loop {
        let next = stack.last_mut().and_then(|(_, pending)| pending.next());
        counter += 1;
        match next {
            Some(child) => {
                stack.push((TreeNode::new(counter, 0, child.payload), child.children.into_iter()));
            }
            None if stack.len() > 1 => {
                if let Some((mut done, _)) = stack.pop() {
                    done.right = counter;
                    if let Some((parent, _)) = stack.last_mut() {
                        parent.children.push(done);
                    }
                }
            }
            None => break,
        }
    }
    let (mut root, _) = stack.swap_remove(0);
    root.right = counter;
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<T: Copy>(nodes: &[TreeNode<T>]) -> Vec<T> {
        nodes.iter().map(|n| n.payload).collect()
    }

    /// ```text
    ///        A [1,14]
    ///      /    |     \
    ///  B[2,7] E[8,9]  F[10,13]
    ///   /  \             |
    /// C[3,4] D[5,6]    G[11,12]
    /// ```
    fn sample_records() -> Vec<FlatRecord<&'static str>> {
        vec![
            FlatRecord::new(1, 14, "A"),
            FlatRecord::new(2, 7, "B"),
            FlatRecord::new(3, 4, "C"),
            FlatRecord::new(5, 6, "D"),
            FlatRecord::new(8, 9, "E"),
            FlatRecord::new(10, 13, "F"),
            FlatRecord::new(11, 12, "G"),
        ]
    }

    #[test]
    fn test_reconstruct_empty() {
        let forest: Vec<TreeNode<()>> = reconstruct(Vec::new());
        assert!(forest.is_empty());
    }

    #[test]
    fn test_reconstruct_single_leaf() {
        let forest = reconstruct(vec![FlatRecord::new(1, 2, "only")]);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn test_reconstruct_electronics_example() {
        let forest = reconstruct(vec![
            FlatRecord::new(1, 6, "Electronics"),
            FlatRecord::new(2, 3, "Phones"),
            FlatRecord::new(4, 5, "Laptops"),
        ]);
        assert_eq!(forest.len(), 1);
        let root = &forest[0];
        assert_eq!(root.payload, "Electronics");
        assert_eq!(names(&root.children), vec!["Phones", "Laptops"]);
        assert!(root.children.iter().all(|c| c.children.is_empty()));
    }

    #[test]
    fn test_reconstruct_nested() {
        let forest = reconstruct(sample_records());
        let a = &forest[0];
        assert_eq!(names(&a.children), vec!["B", "E", "F"]);
        assert_eq!(names(&a.children[0].children), vec!["C", "D"]);
        assert!(a.children[1].children.is_empty());
        assert_eq!(names(&a.children[2].children), vec!["G"]);
    }

    #[test]
    fn test_reconstruct_forest_of_independent_trees() {
        // Two trees, each numbered from 1 in its own store, concatenated with
        // distinct ranges so left stays ascending.
        let forest = reconstruct(vec![
            FlatRecord::new(1, 4, "Food"),
            FlatRecord::new(2, 3, "Dairy"),
            FlatRecord::new(5, 8, "Toys"),
            FlatRecord::new(6, 7, "Puzzles"),
        ]);
        assert_eq!(names(&forest), vec!["Food", "Toys"]);
        assert_eq!(names(&forest[0].children), vec!["Dairy"]);
        assert_eq!(names(&forest[1].children), vec!["Puzzles"]);
    }

    #[test]
    fn test_reconstruct_ancestor_path_is_a_chain() {
        // Ancestor path of G: A, F, G.
        let forest = reconstruct(vec![
            FlatRecord::new(1, 14, "A"),
            FlatRecord::new(10, 13, "F"),
            FlatRecord::new(11, 12, "G"),
        ]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].depth(), 3);
        assert_eq!(forest[0].children[0].children[0].payload, "G");
    }

    #[test]
    fn test_reconstruct_sparse_children_only() {
        // Children of A without their own descendants: non-leaf intervals with
        // nothing inside still close correctly.
        let forest = reconstruct(vec![
            FlatRecord::new(2, 7, "B"),
            FlatRecord::new(8, 9, "E"),
            FlatRecord::new(10, 13, "F"),
        ]);
        assert_eq!(names(&forest), vec!["B", "E", "F"]);
        assert!(forest.iter().all(|n| n.children.is_empty()));
    }

    #[test]
    fn test_reconstruct_deep_chain() {
        let depth = 2_000i64;
        let records: Vec<_> = (0..depth)
            .map(|i| FlatRecord::new(i + 1, 2 * depth - i, i))
            .collect();
        let forest = reconstruct(records);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].depth(), depth as usize);
        assert_eq!(forest[0].len(), depth as usize);
    }

    /// Takes a tree apart without recursing through nested drops.
    fn dismantle<T>(root: TreeNode<T>) {
        let mut stack = vec![root];
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }

    #[test]
    fn test_number_and_map_very_deep_outline() {
        let depth = 200_000u32;
        let mut outline = Outline::leaf(depth - 1);
        for payload in (0..depth - 1).rev() {
            outline = Outline::branch(payload, vec![outline]);
        }

        let mut tree = number_forest(vec![outline]).swap_remove(0);
        assert_eq!((tree.left, tree.right), (1, 2 * i64::from(depth)));
        assert_eq!(tree.depth(), depth as usize);

        let mut seen = 0u32;
        tree = tree.map(&mut |payload: u32| {
            assert_eq!(payload, seen);
            seen += 1;
            payload * 2
        });
        assert_eq!(seen, depth);
        let deepest = tree.iter().last().map(|n| (n.left, n.right, n.payload));
        assert_eq!(
            deepest,
            Some((i64::from(depth), i64::from(depth) + 1, 2 * (depth - 1)))
        );
        dismantle(tree);
    }

    #[test]
    fn test_flatten_round_trip() {
        let records = sample_records();
        let forest = reconstruct(records.clone());
        assert_eq!(flatten_pre_order(&forest), records);
        assert_eq!(reconstruct(flatten_pre_order(&forest)), forest);
    }

    #[test]
    fn test_number_forest_matches_sample() {
        let outline = Outline::branch(
            "A",
            vec![
                Outline::branch("B", vec![Outline::leaf("C"), Outline::leaf("D")]),
                Outline::leaf("E"),
                Outline::branch("F", vec![Outline::leaf("G")]),
            ],
        );
        let forest = number_forest(vec![outline]);
        assert_eq!(forest, reconstruct(sample_records()));
    }

    #[test]
    fn test_number_forest_numbers_each_tree_from_one() {
        let forest = number_forest(vec![
            Outline::leaf("x"),
            Outline::branch("y", vec![Outline::leaf("z")]),
        ]);
        assert_eq!((forest[0].left, forest[0].right), (1, 2));
        assert_eq!((forest[1].left, forest[1].right), (1, 4));
    }

    #[test]
    fn test_tree_node_helpers() {
        let forest = reconstruct(sample_records());
        let a = &forest[0];
        assert_eq!(a.len(), 7);
        assert_eq!(a.depth(), 3);
        assert_eq!(a.descendant_count(), 6);
        let order: Vec<_> = a.iter().map(|n| n.payload).collect();
        assert_eq!(order, vec!["A", "B", "C", "D", "E", "F", "G"]);
        assert_eq!(a.find(|p| *p == "F").map(|n| n.left), Some(10));
        let lowered = a.clone().map(&mut |p: &str| p.to_lowercase());
        assert_eq!(lowered.children[2].children[0].payload, "g");
    }

    #[test]
    fn test_reconstruct_nodes_uses_interval() {
        let forest = reconstruct_nodes(sample_records());
        assert_eq!(forest[0].payload.payload, "A");
        assert_eq!(forest[0].children.len(), 3);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "ascending left order")]
    fn test_reconstruct_rejects_unsorted_in_debug() {
        let _ = reconstruct(vec![FlatRecord::new(2, 3, "b"), FlatRecord::new(1, 4, "a")]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "partially overlaps")]
    fn test_reconstruct_rejects_overlap_in_debug() {
        let _ = reconstruct(vec![FlatRecord::new(1, 4, "a"), FlatRecord::new(3, 6, "b")]);
    }
}
