//! Property-based invariant tests for shapes and layout passes.
//!
//! 1. The leaf shape is the one-level unit silhouette.
//! 2. Combined siblings never overlap at any shared depth.
//! 3. Combined depth is one more than the deepest child.
//! 4. Offsets are strictly increasing in child order.
//! 5. The parent level is the unit extent and the parent is centred.
//! 6. Incremental layout agrees with a from-scratch layout.
//! 7. A pass leaves every node clean.

use cptree_core::{Extent, NodeId, Shape, Structure, Tree};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

const EPS: f64 = 1e-9;

/// Random subtree shapes built by repeatedly combining leaves.
fn shape_strategy() -> impl Strategy<Value = Shape> {
    let leaf = Just(Shape::leaf());
    leaf.prop_recursive(4, 32, 4, |inner| {
        (prop::collection::vec(inner, 1..4), 0.0f64..3.0)
            .prop_map(|(children, sep)| Shape::combine(&children, sep).0)
    })
}

/// Parent choices for a random tree: node `i + 1` hangs under `parents[i] % (i + 1)`.
fn tree_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(any::<usize>(), 0..60)
}

fn build(structure: &Structure, parents: &[usize]) {
    let root = structure.create_root().unwrap();
    assert_eq!(root, NodeId::ROOT);
    for (i, p) in parents.iter().enumerate() {
        let parent = NodeId::new((p % (i + 1)) as u32);
        structure.add_extra_child(parent).unwrap();
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Leaf shape
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn leaf_shape_is_unit() {
    let leaf = Shape::leaf();
    assert_eq!(leaf.depth(), 1);
    assert_eq!(leaf.extents(), &[Extent::new(-0.5, 0.5)]);
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Siblings never overlap
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn siblings_respect_min_separation(
        children in prop::collection::vec(shape_strategy(), 2..5),
        sep in 0.0f64..4.0,
    ) {
        let (_, offsets) = Shape::combine(&children, sep);
        prop_assert_eq!(offsets.len(), children.len());
        for i in 0..children.len() {
            for j in (i + 1)..children.len() {
                let (s1, s2) = (&children[i], &children[j]);
                let shared = s1.depth().min(s2.depth());
                for d in 0..shared {
                    let right = s1.extent(d).unwrap().right;
                    let left = s2.extent(d).unwrap().left;
                    prop_assert!(
                        right + sep <= left + (offsets[j] - offsets[i]) + EPS,
                        "children {} and {} overlap at depth {}", i, j, d
                    );
                }
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Depth
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn combined_depth_is_one_plus_max(
        children in prop::collection::vec(shape_strategy(), 1..5),
    ) {
        let (shape, _) = Shape::combine(&children, 1.0);
        let deepest = children.iter().map(Shape::depth).max().unwrap();
        prop_assert_eq!(shape.depth(), deepest + 1);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Child order is preserved
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn offsets_increase(children in prop::collection::vec(shape_strategy(), 2..6)) {
        let (_, offsets) = Shape::combine(&children, 0.5);
        for w in offsets.windows(2) {
            prop_assert!(w[0] < w[1]);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Parent level and centring
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn parent_is_centred(children in prop::collection::vec(shape_strategy(), 1..5)) {
        let (shape, offsets) = Shape::combine(&children, 1.0);
        prop_assert_eq!(shape.extent(0), Some(Extent::UNIT));
        let first = offsets[0];
        let last = offsets[offsets.len() - 1];
        prop_assert!((first + last).abs() < EPS);

        // Level 1 of the parent is exactly the hull of the children's tops.
        let left = children.iter().zip(&offsets).map(|(c, o)| c.extent(0).unwrap().left + o)
            .fold(f64::INFINITY, f64::min);
        let right = children.iter().zip(&offsets).map(|(c, o)| c.extent(0).unwrap().right + o)
            .fold(f64::NEG_INFINITY, f64::max);
        let level1 = shape.extent(1).unwrap();
        prop_assert!((level1.left - left).abs() < EPS);
        prop_assert!((level1.right - right).abs() < EPS);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Incremental == from scratch
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn incremental_layout_matches_fresh_layout(
        first in tree_strategy(),
        more in tree_strategy(),
    ) {
        let incremental = Tree::new();
        build(incremental.structure(), &first);
        incremental.update_layout(1.0);

        // Grow further, marking as the builder does.
        let base = incremental.node_count();
        for (i, p) in more.iter().enumerate() {
            let parent = NodeId::new((p % (base + i)) as u32);
            let child = incremental.structure().add_extra_child(parent).unwrap();
            incremental.mark_dirty(child);
        }
        incremental.update_layout(1.0);

        let fresh = Tree::new();
        let mut all = first.clone();
        all.extend(more.iter().enumerate().map(|(i, p)| p % (base + i)));
        // `build` reduces modulo the index, which is a no-op for these values.
        build(fresh.structure(), &all);
        fresh.update_layout(1.0);

        prop_assert_eq!(incremental.node_count(), fresh.node_count());
        for i in 0..fresh.node_count() {
            let n = NodeId::new(i as u32);
            prop_assert_eq!(incremental.layout().get_shape(n), fresh.layout().get_shape(n));
            prop_assert_eq!(incremental.layout().get_offset(n), fresh.layout().get_offset(n));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Pass leaves everything clean
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn pass_cleans_every_node(parents in tree_strategy()) {
        let tree = Tree::new();
        build(tree.structure(), &parents);
        let pass = tree.update_layout(1.0);
        prop_assert_eq!(pass.visited, tree.node_count());
        for i in 0..tree.node_count() {
            let n = NodeId::new(i as u32);
            prop_assert!(!tree.layout().is_dirty(n));
            prop_assert!(tree.layout().get_layout_done(n));
            prop_assert!(tree.layout().get_shape(n).is_ok());
        }
    }
}
