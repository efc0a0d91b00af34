//! Append-only tree topology.
//!
//! A [`Structure`] is grown by a single producer (the tree builder) while any
//! number of readers query it. All nodes live in one arena indexed by
//! [`NodeId`]; a node's record is pushed and linked into its parent's child
//! list under one write guard, so a reader sees either the tree before the
//! append or the tree after it, never a child without its parent link.
//!
//! Readers that need several queries to agree with each other (a layout pass,
//! a snapshot) take a [`StructureView`] with [`Structure::read`] and keep it
//! for the duration.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use smallvec::SmallVec;

use crate::error::TreeError;
use crate::node::{NodeId, Status};

/// Topology record of a single node.
#[derive(Debug, Clone)]
struct NodeRecord {
    parent: Option<NodeId>,
    /// Position in the parent's child list, fixed for the node's lifetime.
    alt: u32,
    status: Status,
    children: SmallVec<[NodeId; 2]>,
}

/// Append-only topology of one search tree.
#[derive(Debug, Default)]
pub struct Structure {
    nodes: RwLock<Vec<NodeRecord>>,
}

impl Structure {
    /// Create an empty structure (no root yet).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty structure with room for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    /// Take a consistent read view. Holding it blocks the writer.
    ///
    /// Do not lock the tree's [`Layout`](crate::Layout) while a view is held:
    /// layout passes take the layout mutex first and this guard second. Use
    /// [`Tree::with_geometry`](crate::Tree::with_geometry) to read both.
    pub fn read(&self) -> StructureView<'_> {
        StructureView {
            nodes: self.nodes.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    // Every write either completes or leaves the arena untouched, so a
    // poisoned lock still guards a valid tree.
    fn write(&self) -> RwLockWriteGuard<'_, Vec<NodeRecord>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create node 0 with status [`Status::Undetermined`].
    pub fn create_root(&self) -> Result<NodeId, TreeError> {
        let mut nodes = self.write();
        if !nodes.is_empty() {
            return Err(TreeError::RootExists);
        }
        nodes.push(NodeRecord {
            parent: None,
            alt: 0,
            status: Status::Undetermined,
            children: SmallVec::new(),
        });
        Ok(NodeId::ROOT)
    }

    /// Append an undetermined child to `parent` at its next free index.
    pub fn add_extra_child(&self, parent: NodeId) -> Result<NodeId, TreeError> {
        self.add_child_with_status(parent, Status::Undetermined)
    }

    /// Append a child with an initial status.
    ///
    /// The status is written together with the link, so readers never see the
    /// new node in its placeholder state.
    pub fn add_child_with_status(
        &self,
        parent: NodeId,
        status: Status,
    ) -> Result<NodeId, TreeError> {
        let mut nodes = self.write();
        let next = nodes.len();
        let Some(parent_record) = nodes.get_mut(parent.index()) else {
            return Err(TreeError::UnknownParent { parent });
        };
        let id = u32::try_from(next)
            .map(NodeId::new)
            .map_err(|_| TreeError::CapacityExceeded)?;
        let alt = u32::try_from(parent_record.children.len())
            .map_err(|_| TreeError::CapacityExceeded)?;
        parent_record.children.push(id);
        nodes.push(NodeRecord {
            parent: Some(parent),
            alt,
            status,
            children: SmallVec::new(),
        });
        Ok(id)
    }

    /// Overwrite the status of `node`.
    pub fn set_status(&self, node: NodeId, status: Status) -> Result<(), TreeError> {
        let mut nodes = self.write();
        let record = nodes
            .get_mut(node.index())
            .ok_or(TreeError::UnknownNode { node })?;
        record.status = status;
        Ok(())
    }

    /// Pre-grow the arena for `additional` more nodes.
    pub fn reserve(&self, additional: usize) {
        self.write().reserve(additional);
    }

    // Single-shot queries. Each takes its own read guard; use `read()` when
    // several answers must agree.

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.read().node_count()
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.read().contains(node)
    }

    pub fn child_count(&self, node: NodeId) -> Result<usize, TreeError> {
        self.read().child_count(node)
    }

    pub fn get_child(&self, parent: NodeId, index: usize) -> Result<NodeId, TreeError> {
        self.read().get_child(parent, index)
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        self.read().parent(node)
    }

    pub fn status(&self, node: NodeId) -> Result<Status, TreeError> {
        self.read().status(node)
    }

    pub fn alt_index(&self, node: NodeId) -> Result<u32, TreeError> {
        self.read().alt_index(node)
    }

    /// Owned copy of the child list of `node`.
    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.read().children(node).map(<[NodeId]>::to_vec)
    }
}

/// Consistent read access to a [`Structure`].
///
/// While a view is alive the builder cannot append. Never query the tree's
/// [`Layout`](crate::Layout) while holding one; that inverts the lock order
/// (layout mutex, then structure) and can deadlock against a layout pass
/// with a writer queued behind it.
pub struct StructureView<'a> {
    nodes: RwLockReadGuard<'a, Vec<NodeRecord>>,
}

impl StructureView<'_> {
    fn record(&self, node: NodeId) -> Result<&NodeRecord, TreeError> {
        self.nodes
            .get(node.index())
            .ok_or(TreeError::UnknownNode { node })
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len()
    }

    /// Root id, if the root has been created.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId::ROOT)
    }

    pub fn child_count(&self, node: NodeId) -> Result<usize, TreeError> {
        self.record(node).map(|r| r.children.len())
    }

    pub fn get_child(&self, parent: NodeId, index: usize) -> Result<NodeId, TreeError> {
        let record = self
            .nodes
            .get(parent.index())
            .ok_or(TreeError::UnknownParent { parent })?;
        record
            .children
            .get(index)
            .copied()
            .ok_or(TreeError::IndexOutOfRange {
                parent,
                index,
                count: record.children.len(),
            })
    }

    pub fn children(&self, node: NodeId) -> Result<&[NodeId], TreeError> {
        self.record(node).map(|r| r.children.as_slice())
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        self.record(node).map(|r| r.parent)
    }

    pub fn status(&self, node: NodeId) -> Result<Status, TreeError> {
        self.record(node).map(|r| r.status)
    }

    pub fn alt_index(&self, node: NodeId) -> Result<u32, TreeError> {
        self.record(node).map(|r| r.alt)
    }

    /// Number of edges between `node` and the root.
    pub fn depth_of(&self, node: NodeId) -> Result<usize, TreeError> {
        let mut depth = 0;
        let mut current = self.record(node)?.parent;
        while let Some(p) = current {
            depth += 1;
            current = self.record(p)?.parent;
        }
        Ok(depth)
    }
}
