//! Subtree silhouettes and the contour-packing step.
//!
//! A [`Shape`] records, for every depth level below (and including) a node,
//! the leftmost and rightmost horizontal extent of its subtree relative to
//! the node's own position. Shapes are immutable values: a layout pass that
//! recomputes a node builds a new one and replaces the old one wholesale.
//!
//! [`Shape::combine`] is the contour-matching step of classic tidy-tree
//! drawing. Children are packed left to right in child-index order, each one
//! as far left as the running contour of its already placed siblings allows.

use std::sync::Arc;

/// Horizontal extent of one depth level, relative to the subtree root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub left: f64,
    pub right: f64,
}

impl Extent {
    /// Unit-width level centred on the node.
    pub const UNIT: Self = Self {
        left: -0.5,
        right: 0.5,
    };

    #[must_use]
    pub const fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    #[inline]
    #[must_use]
    pub fn shifted(self, dx: f64) -> Self {
        Self {
            left: self.left + dx,
            right: self.right + dx,
        }
    }

    #[must_use]
    pub fn width(self) -> f64 {
        self.right - self.left
    }
}

/// Horizontal bounds over all levels of a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub right: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn width(self) -> f64 {
        self.right - self.left
    }
}

static LEAF_EXTENTS: [Extent; 1] = [Extent::UNIT];

/// Silhouette of a subtree.
///
/// `Leaf` is the shared one-level unit shape and costs nothing to clone.
/// `Computed` holds the extents of an inner node behind an `Arc`, so cached
/// shapes can be handed to readers without copying.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Shape {
    #[default]
    Leaf,
    Computed(Arc<[Extent]>),
}

impl Shape {
    /// The unit silhouette `[(-0.5, +0.5)]` used by every leaf.
    #[must_use]
    pub const fn leaf() -> Self {
        Self::Leaf
    }

    /// Build a shape from explicit levels.
    ///
    /// A single unit level (or no level at all) collapses to [`Shape::Leaf`].
    #[must_use]
    pub fn from_extents(extents: Vec<Extent>) -> Self {
        if extents.is_empty() || extents.as_slice() == LEAF_EXTENTS.as_slice() {
            return Self::Leaf;
        }
        Self::Computed(extents.into())
    }

    /// Levels from the node itself downwards.
    #[must_use]
    pub fn extents(&self) -> &[Extent] {
        match self {
            Self::Leaf => &LEAF_EXTENTS,
            Self::Computed(extents) => extents,
        }
    }

    /// Number of levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.extents().len()
    }

    /// Extent at `level` (0 is the node itself).
    #[must_use]
    pub fn extent(&self, level: usize) -> Option<Extent> {
        self.extents().get(level).copied()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf)
    }

    /// Minimum left and maximum right extent over all levels.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        self.extents().iter().fold(
            BoundingBox {
                left: f64::INFINITY,
                right: f64::NEG_INFINITY,
            },
            |bb, e| BoundingBox {
                left: bb.left.min(e.left),
                right: bb.right.max(e.right),
            },
        )
    }

    /// Pack `children` side by side under a new node.
    ///
    /// Returns the parent's shape and, aligned with `children`, each child's
    /// horizontal offset relative to the parent. At every shared depth a child
    /// starts at least `min_separation` right of the contour of the siblings
    /// placed before it. The parent is centred between its first and last
    /// child. With no children the result is the leaf shape.
    #[must_use]
    pub fn combine(children: &[Shape], min_separation: f64) -> (Shape, Vec<f64>) {
        let Some((first, rest)) = children.split_first() else {
            return (Self::Leaf, Vec::new());
        };

        // Contour of everything placed so far, in first-child coordinates.
        let mut envelope: Vec<Extent> = first.extents().to_vec();
        let mut offsets = Vec::with_capacity(children.len());
        offsets.push(0.0);

        for child in rest {
            let levels = child.extents();
            let shared = envelope.len().min(levels.len());
            let offset = envelope[..shared]
                .iter()
                .zip(&levels[..shared])
                .map(|(env, level)| env.right + min_separation - level.left)
                .fold(f64::NEG_INFINITY, f64::max);

            for (depth, level) in levels.iter().enumerate() {
                let placed = level.shifted(offset);
                match envelope.get_mut(depth) {
                    Some(env) => {
                        env.left = env.left.min(placed.left);
                        env.right = env.right.max(placed.right);
                    }
                    None => envelope.push(placed),
                }
            }
            offsets.push(offset);
        }

        let last = offsets[offsets.len() - 1];
        let shift = last / 2.0;
        for offset in &mut offsets {
            *offset -= shift;
        }

        let mut extents = Vec::with_capacity(envelope.len() + 1);
        extents.push(Extent::UNIT);
        extents.extend(envelope.into_iter().map(|e| e.shifted(-shift)));
        (Self::Computed(extents.into()), offsets)
    }
}
