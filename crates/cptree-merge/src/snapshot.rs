//! Owned copies of a tree's topology.

use cptree_core::{NodeId, Status, Structure, Tree};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SnapshotNode {
    parent: Option<NodeId>,
    status: Status,
    children: Vec<NodeId>,
}

/// Point-in-time copy of a [`Structure`].
///
/// Taken under one read guard, so it is always a consistent prefix of the
/// tree even while a builder keeps appending. Once taken it holds no locks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    nodes: Vec<SnapshotNode>,
}

impl TreeSnapshot {
    #[must_use]
    pub fn capture(structure: &Structure) -> Self {
        let view = structure.read();
        let nodes = (0..view.node_count())
            .map(|i| {
                let node = NodeId::new(i as u32);
                SnapshotNode {
                    parent: view.parent(node).ok().flatten(),
                    status: view.status(node).unwrap_or_default(),
                    children: view.children(node).map(<[NodeId]>::to_vec).unwrap_or_default(),
                }
            })
            .collect();
        Self { nodes }
    }

    #[must_use]
    pub fn of(tree: &Tree) -> Self {
        Self::capture(tree.structure())
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
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId::ROOT)
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.index()).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn status(&self, node: NodeId) -> Option<Status> {
        self.nodes.get(node.index()).map(|n| n.status)
    }

    /// Children of `node` in alternative order; empty for unknown nodes.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.index())
            .map_or(&[], |n| n.children.as_slice())
    }

    /// Number of nodes in the subtree rooted at `node`, itself included.
    #[must_use]
    pub fn subtree_size(&self, node: NodeId) -> usize {
        if node.index() >= self.nodes.len() {
            return 0;
        }
        let mut count = 0;
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            count += 1;
            stack.extend_from_slice(self.children(n));
        }
        count
    }

    /// Count of nodes per status, in [`Status`] declaration order.
    #[must_use]
    pub fn status_counts(&self) -> [(Status, usize); 5] {
        let mut counts = [
            (Status::Branch, 0),
            (Status::Solution, 0),
            (Status::Failure, 0),
            (Status::Skipped, 0),
            (Status::Undetermined, 0),
        ];
        for node in &self.nodes {
            if let Some(slot) = counts.iter_mut().find(|(s, _)| *s == node.status) {
                slot.1 += 1;
            }
        }
        counts
    }
}
