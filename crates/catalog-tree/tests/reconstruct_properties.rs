//! Property-style tests for reconstruction over randomly shaped forests.
//!
//! Uses a seeded RNG so failures are reproducible.

use catalog_tree::{flatten_pre_order, number_forest, reconstruct, Interval, Outline, TreeNode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Builds a random outline with at most `budget` nodes.
fn random_outline(rng: &mut StdRng, budget: &mut usize, depth: usize, label: &mut u32) -> Outline<u32> {
    *label += 1;
    let mut node = Outline::leaf(*label);
    if depth == 0 {
        return node;
    }
    let fan_out = rng.gen_range(0..4);
    for _ in 0..fan_out {
        if *budget == 0 {
            break;
        }
        *budget -= 1;
        node.children
            .push(random_outline(rng, budget, depth - 1, label));
    }
    node
}

fn random_forest(seed: u64) -> Vec<TreeNode<u32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut label = 0;
    let trees = rng.gen_range(1..4);
    let outlines = (0..trees)
        .map(|_| {
            let mut budget = rng.gen_range(0..40);
            let depth = rng.gen_range(0..6);
            random_outline(&mut rng, &mut budget, depth, &mut label)
        })
        .collect();
    number_forest(outlines)
}

/// Shifts each tree into its own range so a forest has ascending `left`.
fn offset_forest(forest: Vec<TreeNode<u32>>) -> Vec<TreeNode<u32>> {
    let mut offset = 0;
    forest
        .into_iter()
        .map(|tree| {
            let width = tree.right;
            let shifted = shift(tree, offset);
            offset += width;
            shifted
        })
        .collect()
}

fn shift(node: TreeNode<u32>, by: i64) -> TreeNode<u32> {
    TreeNode {
        left: node.left + by,
        right: node.right + by,
        payload: node.payload,
        children: node.children.into_iter().map(|c| shift(c, by)).collect(),
    }
}

#[test]
fn test_round_trip_random_forests() {
    for seed in 0..200 {
        let forest = offset_forest(random_forest(seed));
        let flat = flatten_pre_order(&forest);
        assert_eq!(reconstruct(flat), forest, "seed {seed}");
    }
}

#[test]
fn test_descendant_count_matches_width() {
    for seed in 0..100 {
        for tree in random_forest(seed) {
            for node in tree.iter() {
                assert!(node.left < node.right);
                assert_eq!(node.descendant_count(), node.len() - 1, "seed {seed}");
                assert_eq!(node.is_leaf(), node.children.is_empty());
            }
        }
    }
}

#[test]
fn test_children_are_directly_contained() {
    for seed in 0..100 {
        let forest = offset_forest(random_forest(seed));
        let rebuilt = reconstruct(flatten_pre_order(&forest));
        for tree in &rebuilt {
            for node in tree.iter() {
                let mut previous_right = node.left;
                for child in &node.children {
                    assert!(node.contains(child));
                    assert!(child.left > previous_right, "siblings overlap");
                    previous_right = child.right;
                }
            }
        }
    }
}
