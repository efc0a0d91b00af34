//! Merge results.

use std::fmt;

use cptree_core::{NodeId, Status};

// ── Classification ──────────────────────────────────────────────────────

/// Where a merged node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Matched in both source trees.
    IdenticalInBoth,
    /// Copied from the first tree only.
    OnlyInA,
    /// Copied from the second tree only.
    OnlyInB,
}

impl Classification {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IdenticalInBoth => "identical",
            Self::OnlyInA => "only_in_a",
            Self::OnlyInB => "only_in_b",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the merged tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedNode {
    pub classification: Classification,
    /// Source node in the first tree, if any.
    pub origin_a: Option<NodeId>,
    /// Source node in the second tree, if any.
    pub origin_b: Option<NodeId>,
}

/// A matched pair whose statuses differ.
///
/// The merged node carries `status_a`; the pair is still
/// [`Classification::IdenticalInBoth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMismatch {
    pub merged: NodeId,
    pub status_a: Status,
    pub status_b: Status,
}

// ── Result ──────────────────────────────────────────────────────────────

/// Per-node classification of a merged tree, indexed by merged [`NodeId`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    nodes: Vec<MergedNode>,
    status_mismatches: Vec<StatusMismatch>,
    pub identical: usize,
    pub only_in_a: usize,
    pub only_in_b: usize,
}

impl MergeResult {
    pub(crate) fn push(&mut self, node: MergedNode) {
        match node.classification {
            Classification::IdenticalInBoth => self.identical += 1,
            Classification::OnlyInA => self.only_in_a += 1,
            Classification::OnlyInB => self.only_in_b += 1,
        }
        self.nodes.push(node);
    }

    pub(crate) fn push_mismatch(&mut self, mismatch: StatusMismatch) {
        self.status_mismatches.push(mismatch);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn node(&self, merged: NodeId) -> Option<&MergedNode> {
        self.nodes.get(merged.index())
    }

    #[must_use]
    pub fn classification(&self, merged: NodeId) -> Option<Classification> {
        self.node(merged).map(|n| n.classification)
    }

    /// Source nodes `(in A, in B)` of a merged node.
    #[must_use]
    pub fn origin(&self, merged: NodeId) -> Option<(Option<NodeId>, Option<NodeId>)> {
        self.node(merged).map(|n| (n.origin_a, n.origin_b))
    }

    /// Merged nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &MergedNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::new(i as u32), n))
    }

    #[must_use]
    pub fn status_mismatches(&self) -> &[StatusMismatch] {
        &self.status_mismatches
    }

    /// True if every node matched and no statuses differ.
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.only_in_a == 0 && self.only_in_b == 0 && self.status_mismatches.is_empty()
    }
}
