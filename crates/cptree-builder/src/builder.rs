//! Tree builder state machine.
//!
//! A [`TreeBuilder`] is the single writer of one [`Tree`]. It applies node
//! events in order, growing the structure and marking the affected layout
//! paths dirty. Geometry itself is computed later, on demand, by whoever
//! reads the tree.
//!
//! # States
//!
//! ```text
//!   Building ──Done──▶ Done
//! ```
//!
//! Events that reference unknown nodes, create a second root, or arrive after
//! `Done` are malformed: they are logged, counted and dropped. The tree built
//! so far is never touched by a malformed event.

use std::fmt;
use std::sync::Arc;

use cptree_core::{BuilderConfig, NodeId, Status, Tree, TreeError};
use tracing::{debug, warn};

use crate::event::NodeEvent;

/// Builder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Building,
    Done,
}

/// Reason an event was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedEvent {
    /// `NodeCreate` referenced a parent that does not exist.
    UnknownParent { parent: NodeId },
    /// `NodeStatusUpdate` referenced a node that does not exist.
    UnknownNode { node: NodeId },
    /// A second root was announced.
    DuplicateRoot,
    /// The stream already ended.
    AfterDone { kind: &'static str },
    /// The tree cannot hold more nodes.
    TreeFull,
}

impl fmt::Display for MalformedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownParent { parent } => write!(f, "node created under unknown parent {parent}"),
            Self::UnknownNode { node } => write!(f, "status update for unknown node {node}"),
            Self::DuplicateRoot => write!(f, "root announced twice"),
            Self::AfterDone { kind } => write!(f, "{kind} event after done"),
            Self::TreeFull => write!(f, "tree is full"),
        }
    }
}

impl std::error::Error for MalformedEvent {}

/// Effect of an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Created(NodeId),
    Updated(NodeId),
    Finished,
}

/// Totals reported when a builder finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildSummary {
    pub nodes: usize,
    pub accepted: usize,
    pub malformed: usize,
    pub finished: bool,
}

/// Applies a node event stream to one tree.
#[derive(Debug)]
pub struct TreeBuilder {
    tree: Arc<Tree>,
    state: BuilderState,
    reserve_batch: usize,
    reserved: usize,
    accepted: usize,
    malformed: usize,
    label: String,
}

impl TreeBuilder {
    #[must_use]
    pub fn new(tree: Arc<Tree>, config: &BuilderConfig) -> Self {
        Self {
            reserved: tree.node_count(),
            tree,
            state: BuilderState::Building,
            reserve_batch: config.reserve_batch.max(1),
            accepted: 0,
            malformed: 0,
            label: String::new(),
        }
    }

    /// Name used in log records (usually the execution name).
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    #[must_use]
    pub fn state(&self) -> BuilderState {
        self.state
    }

    #[must_use]
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    #[must_use]
    pub fn summary(&self) -> BuildSummary {
        BuildSummary {
            nodes: self.tree.node_count(),
            accepted: self.accepted,
            malformed: self.malformed,
            finished: self.state == BuilderState::Done,
        }
    }

    /// Apply one event.
    ///
    /// A malformed event has already been logged and counted when the error
    /// is returned; callers are free to ignore it.
    pub fn handle(&mut self, event: NodeEvent) -> Result<EventOutcome, MalformedEvent> {
        if self.state == BuilderState::Done {
            return Err(self.reject(MalformedEvent::AfterDone { kind: event.kind() }));
        }
        let result = match event {
            NodeEvent::NodeCreate {
                parent,
                alt_index,
                status,
            } => self.create(parent, alt_index, status),
            NodeEvent::NodeStatusUpdate { node, status } => self.update_status(node, status),
            NodeEvent::Done => {
                self.transition_done();
                Ok(EventOutcome::Finished)
            }
        };
        match result {
            Ok(outcome) => {
                self.accepted += 1;
                Ok(outcome)
            }
            Err(reason) => Err(self.reject(reason)),
        }
    }

    /// End the stream without a `Done` event.
    pub fn finish(&mut self) -> BuildSummary {
        if self.state == BuilderState::Building {
            self.transition_done();
        }
        self.summary()
    }

    fn transition_done(&mut self) {
        self.state = BuilderState::Done;
        debug!(
            execution = %self.label,
            nodes = self.tree.node_count(),
            malformed = self.malformed,
            "tree builder done"
        );
    }

    fn reject(&mut self, reason: MalformedEvent) -> MalformedEvent {
        self.malformed += 1;
        warn!(execution = %self.label, reason = %reason, "dropping malformed event");
        reason
    }

    fn ensure_capacity(&mut self) {
        let needed = self.tree.node_count() + 1;
        if needed <= self.reserved {
            return;
        }
        self.tree.structure().reserve(self.reserve_batch);
        self.tree.layout().lock().reserve(self.reserve_batch);
        self.reserved = needed - 1 + self.reserve_batch;
        debug!(execution = %self.label, reserved = self.reserved, "reserved tree storage");
    }

    fn create(
        &mut self,
        parent: Option<NodeId>,
        alt_index: u32,
        status: Status,
    ) -> Result<EventOutcome, MalformedEvent> {
        let tree = Arc::clone(&self.tree);
        let structure = tree.structure();
        let node = match parent {
            None => {
                self.ensure_capacity();
                let root = structure
                    .create_root()
                    .map_err(|_| MalformedEvent::DuplicateRoot)?;
                structure
                    .set_status(root, status)
                    .map_err(|_| MalformedEvent::UnknownNode { node: root })?;
                root
            }
            Some(parent) => {
                let next = structure
                    .child_count(parent)
                    .map_err(|_| MalformedEvent::UnknownParent { parent })?;
                if next != alt_index as usize {
                    debug!(
                        execution = %self.label,
                        %parent,
                        alt_index,
                        slot = next,
                        "alt index differs from next free slot"
                    );
                }
                self.ensure_capacity();
                structure
                    .add_child_with_status(parent, status)
                    .map_err(|e| match e {
                        TreeError::UnknownParent { parent } => {
                            MalformedEvent::UnknownParent { parent }
                        }
                        _ => MalformedEvent::TreeFull,
                    })?
            }
        };
        self.tree.mark_dirty(node);
        Ok(EventOutcome::Created(node))
    }

    fn update_status(
        &mut self,
        node: NodeId,
        status: Status,
    ) -> Result<EventOutcome, MalformedEvent> {
        self.tree
            .structure()
            .set_status(node, status)
            .map_err(|_| MalformedEvent::UnknownNode { node })?;
        self.tree.mark_dirty(node);
        Ok(EventOutcome::Updated(node))
    }
}
