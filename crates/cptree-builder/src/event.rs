//! Node events produced by a solver connection.
//!
//! The wire shape is a tagged record:
//!
//! ```text
//! {"type":"node_create","parent":3,"alt_index":1,"status":"branch"}
//! {"type":"node_create","alt_index":0,"status":"branch"}        // root
//! {"type":"node_status_update","node":5,"status":"solution"}
//! {"type":"done"}
//! ```
//!
//! Decoding and transport belong to the connection layer; this module only
//! defines the records it hands over.

use cptree_core::{NodeId, Status};
use serde::{Deserialize, Serialize};

/// One record of a node event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    /// A new node. `parent == None` creates the root.
    NodeCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<NodeId>,
        alt_index: u32,
        status: Status,
    },
    /// The solver revised the status of an existing node.
    NodeStatusUpdate { node: NodeId, status: Status },
    /// End of the stream.
    Done,
}

impl NodeEvent {
    #[must_use]
    pub const fn root(status: Status) -> Self {
        Self::NodeCreate {
            parent: None,
            alt_index: 0,
            status,
        }
    }

    #[must_use]
    pub const fn child(parent: NodeId, alt_index: u32, status: Status) -> Self {
        Self::NodeCreate {
            parent: Some(parent),
            alt_index,
            status,
        }
    }

    #[must_use]
    pub const fn status(node: NodeId, status: Status) -> Self {
        Self::NodeStatusUpdate { node, status }
    }

    /// Event kind name for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NodeCreate { .. } => "node_create",
            Self::NodeStatusUpdate { .. } => "node_status_update",
            Self::Done => "done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let json = serde_json::to_string(&NodeEvent::child(NodeId::new(3), 1, Status::Branch))
            .unwrap();
        assert_eq!(
            json,
            r#"{"type":"node_create","parent":3,"alt_index":1,"status":"branch"}"#
        );
        assert_eq!(
            serde_json::to_string(&NodeEvent::Done).unwrap(),
            r#"{"type":"done"}"#
        );
    }

    #[test]
    fn root_omits_parent() {
        let event: NodeEvent =
            serde_json::from_str(r#"{"type":"node_create","alt_index":0,"status":"undetermined"}"#)
                .unwrap();
        assert_eq!(event, NodeEvent::root(Status::Undetermined));

        let event: NodeEvent = serde_json::from_str(
            r#"{"type":"node_status_update","node":5,"status":"solution"}"#,
        )
        .unwrap();
        assert_eq!(event, NodeEvent::status(NodeId::new(5), Status::Solution));
        assert_eq!(event.kind(), "node_status_update");
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(serde_json::from_str::<NodeEvent>(r#"{"type":"restart"}"#).is_err());
    }
}
