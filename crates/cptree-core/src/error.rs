//! Errors returned by direct structure and layout queries.

use std::fmt;

use crate::node::NodeId;

/// Recoverable failure of a [`Structure`](crate::Structure) or
/// [`Layout`](crate::Layout) query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// A child was requested for a node that does not exist.
    UnknownParent { parent: NodeId },
    /// The node does not exist.
    UnknownNode { node: NodeId },
    /// `index` is past the end of the parent's child list.
    IndexOutOfRange {
        parent: NodeId,
        index: usize,
        count: usize,
    },
    /// `create_root` was called on a tree that already has a root.
    RootExists,
    /// No shape has been stored for the node; run a layout pass and retry.
    ShapeNotComputed { node: NodeId },
    /// The tree cannot grow past the `NodeId` range.
    CapacityExceeded,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownParent { parent } => write!(f, "unknown parent node {parent}"),
            Self::UnknownNode { node } => write!(f, "unknown node {node}"),
            Self::IndexOutOfRange {
                parent,
                index,
                count,
            } => write!(
                f,
                "child index {index} out of range for node {parent} ({count} children)"
            ),
            Self::RootExists => write!(f, "tree already has a root"),
            Self::ShapeNotComputed { node } => {
                write!(f, "shape of node {node} has not been computed")
            }
            Self::CapacityExceeded => write!(f, "tree exceeds the node id range"),
        }
    }
}

impl std::error::Error for TreeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_node() {
        let err = TreeError::IndexOutOfRange {
            parent: NodeId::new(4),
            index: 2,
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "child index 2 out of range for node #4 (2 children)"
        );
        assert!(
            TreeError::ShapeNotComputed {
                node: NodeId::new(7)
            }
            .to_string()
            .contains("#7")
        );
    }
}
