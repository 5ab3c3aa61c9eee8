//! # catalog-tree
//!
//! Value types and pure algorithms for a nested-set (interval) category
//! hierarchy.
//!
//! This crate provides:
//! - **Category values**: [`CategoryNode`], its structured [`CategoryName`]
//!   and the [`NewCategory`] insert payload
//! - **Tree reconstruction**: [`reconstruct`] turns an ascending,
//!   interval-annotated record stream into nested [`TreeNode`]s in O(n)
//! - **Invariant checking**: [`invariants::check_tree`] validates a flat set of
//!   rows against the nested-set rules
//!
//! Nothing in this crate performs I/O. The storage engine lives in
//! `catalog-store`, the search-index projection in `catalog-projection`.
//!
//! ## Nested-set model
//!
//! Every node carries a `[left, right]` interval. A node's interval contains
//! exactly the intervals of its descendants, so ancestry is a containment test
//! and a `left`-ascending scan is a pre-order walk:
//!
//! ```text
//!            Electronics [1,8]
//!           /                 \
//!     Phones [2,5]        Laptops [6,7]
//!         |
//!   Smartphones [3,4]
//! ```
//!
//! ## Reconstruction usage
//!
//! ```rust
//! use catalog_tree::{reconstruct, FlatRecord};
//!
//! let forest = reconstruct(vec![
//!     FlatRecord::new(1, 6, "Electronics"),
//!     FlatRecord::new(2, 3, "Phones"),
//!     FlatRecord::new(4, 5, "Laptops"),
//! ]);
//!
//! assert_eq!(forest.len(), 1);
//! let names: Vec<_> = forest[0].children.iter().map(|c| c.payload).collect();
//! assert_eq!(names, vec!["Phones", "Laptops"]);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
pub mod invariants;
mod node;
mod reconstruct;

pub use error::{TreeError, TreeResult};
pub use invariants::{check_forest, check_tree, InvariantViolation};
pub use node::{CategoryName, CategoryNode, Interval, NewCategory};
pub use reconstruct::{
    flatten_pre_order, number_forest, reconstruct, reconstruct_nodes, FlatRecord, Outline,
    PreOrderIter, TreeNode,
};

/// Category identifier (64-bit signed integer, the relational row id).
pub type CategoryId = i64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _: Option<CategoryNode> = None;
        let _: Option<TreeNode<CategoryNode>> = None;
        let _: Option<FlatRecord<()>> = None;
        let _: Option<TreeResult<()>> = None;
    }

    #[test]
    fn test_crate_level_example() {
        let forest = reconstruct(vec![
            FlatRecord::new(1, 6, "Electronics"),
            FlatRecord::new(2, 3, "Phones"),
            FlatRecord::new(4, 5, "Laptops"),
        ]);
        assert_eq!(forest[0].payload, "Electronics");
        assert_eq!(forest[0].children.len(), 2);
    }
}
