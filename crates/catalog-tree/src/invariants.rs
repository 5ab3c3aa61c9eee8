//! Nested-set invariant checks.
//!
//! [`check_tree`] validates every row of one tree at once. Stores run it
//! inside a mutation's transaction before committing; tests run it after
//! every operation.

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::node::CategoryNode;
use crate::CategoryId;

/// A broken nested-set rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// No rows for the tree.
    #[error("tree {tree_id} has no rows")]
    EmptyTree {
        /// Tree that was checked.
        tree_id: CategoryId,
    },

    /// A row belongs to a different tree than the rest.
    #[error("node {id} belongs to tree {found}, expected tree {expected}")]
    MixedTrees {
        /// Offending node.
        id: CategoryId,
        /// Tree the check was run for.
        expected: CategoryId,
        /// Tree recorded on the row.
        found: CategoryId,
    },

    /// No root row (`parent_id == id == tree_id`).
    #[error("tree {tree_id} has no root")]
    MissingRoot {
        /// Tree that was checked.
        tree_id: CategoryId,
    },

    /// A self-parented row other than the tree's root.
    #[error("tree {tree_id} has a second root {id}")]
    ExtraRoot {
        /// Tree that was checked.
        tree_id: CategoryId,
        /// The extra self-parented node.
        id: CategoryId,
    },

    /// Root does not span `[1, 2n]`.
    #[error("root {id} spans [{left}, {right}], expected [1, {expected_right}]")]
    RootBounds {
        /// Root id.
        id: CategoryId,
        /// Observed left boundary.
        left: i64,
        /// Observed right boundary.
        right: i64,
        /// Twice the node count.
        expected_right: i64,
    },

    /// `left >= right`.
    #[error("node {id} has empty interval [{left}, {right}]")]
    EmptyInterval {
        /// Offending node.
        id: CategoryId,
        /// Left boundary.
        left: i64,
        /// Right boundary.
        right: i64,
    },

    /// A boundary value outside `1..=2n`.
    #[error("node {id} uses boundary {boundary} outside 1..={max}")]
    OutOfRange {
        /// Offending node.
        id: CategoryId,
        /// The boundary value.
        boundary: i64,
        /// Largest legal boundary.
        max: i64,
    },

    /// The same boundary value appears twice.
    #[error("boundary {boundary} is used twice in tree {tree_id}")]
    BoundaryReuse {
        /// Tree that was checked.
        tree_id: CategoryId,
        /// Repeated value.
        boundary: i64,
    },

    /// Two intervals overlap without one containing the other.
    #[error("node {inner} partially overlaps node {outer}")]
    PartialOverlap {
        /// Earlier (enclosing candidate) node.
        outer: CategoryId,
        /// Later node.
        inner: CategoryId,
    },

    /// `parent_id` is not the innermost enclosing interval.
    #[error("node {id} has parent {actual}, but its innermost container is {expected}")]
    WrongParent {
        /// Offending node.
        id: CategoryId,
        /// Innermost enclosing node.
        expected: CategoryId,
        /// Recorded parent.
        actual: CategoryId,
    },
}

/// Checks every nested-set rule for the rows of a single tree.
///
/// `rows` must contain every node of `tree_id` and nothing else; order does
/// not matter. Verified rules:
///
/// - exactly one root, with `parent_id == id == tree_id`, spanning `[1, 2n]`
/// - `left < right` everywhere
/// - boundaries are exactly `1..=2n`, each used once, so every node's
///   descendant count is `(right - left - 1) / 2`
/// - intervals are disjoint or nested
/// - each `parent_id` names the innermost enclosing node
pub fn check_tree(tree_id: CategoryId, rows: &[CategoryNode]) -> Result<(), InvariantViolation> {
    if rows.is_empty() {
        return Err(InvariantViolation::EmptyTree { tree_id });
    }

    let max = 2 * rows.len() as i64;
    let mut seen = HashSet::with_capacity(rows.len() * 2);
    let mut root: Option<&CategoryNode> = None;

    for row in rows {
        if row.tree_id != tree_id {
            return Err(InvariantViolation::MixedTrees {
                id: row.id,
                expected: tree_id,
                found: row.tree_id,
            });
        }
        if row.left >= row.right {
            return Err(InvariantViolation::EmptyInterval {
                id: row.id,
                left: row.left,
                right: row.right,
            });
        }
        for boundary in [row.left, row.right] {
            if !(1..=max).contains(&boundary) {
                return Err(InvariantViolation::OutOfRange {
                    id: row.id,
                    boundary,
                    max,
                });
            }
            if !seen.insert(boundary) {
                return Err(InvariantViolation::BoundaryReuse { tree_id, boundary });
            }
        }
        if row.is_root() {
            if row.id != tree_id || root.is_some() {
                return Err(InvariantViolation::ExtraRoot { tree_id, id: row.id });
            }
            root = Some(row);
        }
    }

    let root = root.ok_or(InvariantViolation::MissingRoot { tree_id })?;
    if root.left != 1 || root.right != max {
        return Err(InvariantViolation::RootBounds {
            id: root.id,
            left: root.left,
            right: root.right,
            expected_right: max,
        });
    }

    let mut ordered: Vec<&CategoryNode> = rows.iter().collect();
    ordered.sort_by_key(|row| row.left);

    // Stack of open containers, innermost last.
    let mut open: Vec<&CategoryNode> = Vec::new();
    for row in ordered {
        while open.last().is_some_and(|top| top.right < row.left) {
            open.pop();
        }
        if let Some(top) = open.last() {
            if row.right > top.right {
                return Err(InvariantViolation::PartialOverlap {
                    outer: top.id,
                    inner: row.id,
                });
            }
            if row.parent_id != top.id {
                return Err(InvariantViolation::WrongParent {
                    id: row.id,
                    expected: top.id,
                    actual: row.parent_id,
                });
            }
        }
        open.push(row);
    }

    Ok(())
}

/// Checks every tree present in `rows`, grouping by `tree_id`.
pub fn check_forest(rows: &[CategoryNode]) -> Result<(), InvariantViolation> {
    let mut trees: BTreeMap<CategoryId, Vec<CategoryNode>> = BTreeMap::new();
    for row in rows {
        trees.entry(row.tree_id).or_default().push(row.clone());
    }
    for (tree_id, tree_rows) in &trees {
        check_tree(*tree_id, tree_rows)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::CategoryName;

    fn row(id: CategoryId, parent_id: CategoryId, left: i64, right: i64) -> CategoryNode {
        CategoryNode {
            id,
            parent_id,
            tree_id: 1,
            left,
            right,
            name: CategoryName::new(format!("c{id}")).unwrap(),
            description: None,
            icon: None,
        }
    }

    fn electronics() -> Vec<CategoryNode> {
        vec![row(1, 1, 1, 6), row(2, 1, 2, 3), row(3, 1, 4, 5)]
    }

    #[test]
    fn test_valid_tree_passes() {
        assert_eq!(check_tree(1, &electronics()), Ok(()));
    }

    #[test]
    fn test_order_does_not_matter() {
        let mut rows = electronics();
        rows.reverse();
        assert_eq!(check_tree(1, &rows), Ok(()));
    }

    #[test]
    fn test_empty_tree() {
        assert_eq!(
            check_tree(9, &[]),
            Err(InvariantViolation::EmptyTree { tree_id: 9 })
        );
    }

    #[test]
    fn test_empty_interval() {
        let rows = vec![row(1, 1, 1, 4), row(2, 1, 3, 2)];
        assert!(matches!(
            check_tree(1, &rows),
            Err(InvariantViolation::EmptyInterval { id: 2, .. })
        ));
    }

    #[test]
    fn test_partial_overlap() {
        // [2,4] and [3,5] overlap partially inside the root.
        let rows = vec![row(1, 1, 1, 6), row(2, 1, 2, 4), row(3, 2, 3, 5)];
        assert_eq!(
            check_tree(1, &rows),
            Err(InvariantViolation::PartialOverlap { outer: 2, inner: 3 })
        );
    }

    #[test]
    fn test_wrong_parent() {
        let rows = vec![row(1, 1, 1, 6), row(2, 1, 2, 5), row(3, 1, 3, 4)];
        assert_eq!(
            check_tree(1, &rows),
            Err(InvariantViolation::WrongParent {
                id: 3,
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_gap_in_boundaries() {
        let rows = vec![row(1, 1, 1, 6), row(2, 1, 2, 3), row(3, 1, 5, 7)];
        assert!(matches!(
            check_tree(1, &rows),
            Err(InvariantViolation::OutOfRange { id: 3, boundary: 7, max: 6 })
        ));
    }

    #[test]
    fn test_boundary_reuse() {
        let rows = vec![row(1, 1, 1, 6), row(2, 1, 2, 3), row(3, 1, 3, 4)];
        assert_eq!(
            check_tree(1, &rows),
            Err(InvariantViolation::BoundaryReuse {
                tree_id: 1,
                boundary: 3
            })
        );
    }

    #[test]
    fn test_root_bounds() {
        let rows = vec![row(1, 1, 2, 3)];
        assert!(matches!(
            check_tree(1, &rows),
            Err(InvariantViolation::OutOfRange { .. })
        ));
        let rows = vec![row(1, 1, 2, 4), row(2, 1, 1, 3)];
        assert!(check_tree(1, &rows).is_err());
    }

    #[test]
    fn test_missing_and_extra_root() {
        let rows = vec![row(2, 1, 1, 2)];
        assert_eq!(
            check_tree(1, &rows),
            Err(InvariantViolation::MissingRoot { tree_id: 1 })
        );
        let rows = vec![row(1, 1, 1, 4), row(2, 2, 2, 3)];
        assert_eq!(
            check_tree(1, &rows),
            Err(InvariantViolation::ExtraRoot { tree_id: 1, id: 2 })
        );
    }

    #[test]
    fn test_mixed_trees() {
        let mut rows = electronics();
        rows[2].tree_id = 5;
        assert!(matches!(
            check_tree(1, &rows),
            Err(InvariantViolation::MixedTrees { id: 3, found: 5, .. })
        ));
    }

    #[test]
    fn test_check_forest_groups_trees() {
        let mut rows = electronics();
        let mut other = row(10, 10, 1, 2);
        other.tree_id = 10;
        rows.push(other);
        assert_eq!(check_forest(&rows), Ok(()));
    }
}
