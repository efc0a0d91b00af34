//! Per-tree geometry cache with dirty tracking.
//!
//! # Model
//!
//! Every node owns one [`LayoutEntry`]: its cached [`Shape`], its horizontal
//! offset relative to its parent, a `dirty` flag (own shape is stale) and a
//! `layout_done` flag (nothing below it is stale). Entries live in a single
//! arena indexed by [`NodeId`] and grow together, so the four fields always
//! stay aligned. Entries that were never written read as the defaults: no
//! shape, offset `0.0`, dirty, not done.
//!
//! # Concurrency
//!
//! All entries of one tree sit behind one mutex ([`Layout`]). A layout pass
//! holds that mutex for its whole bottom-up traversal, so no reader ever sees
//! a parent shape computed against stale children. When the pass also needs
//! topology it takes the structure's read view *after* the layout mutex; the
//! builder never holds the structure's write guard while waiting on layout,
//! so the two locks cannot deadlock.
//!
//! # Invariants
//!
//! 1. `dirty(n)` implies `!layout_done(n)`.
//! 2. Outside a pass, `!layout_done(n)` implies `!layout_done(parent(n))`:
//!    any pending work is reachable from the root through not-done nodes.
//! 3. After [`LayoutState::update`] every node has a shape and all flags are
//!    clean.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::debug_span;

use crate::error::TreeError;
use crate::node::NodeId;
use crate::shape::{BoundingBox, Shape};
use crate::structure::{Structure, StructureView};

/// Cached geometry of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    pub shape: Option<Shape>,
    /// Horizontal offset relative to the parent.
    pub offset: f64,
    pub dirty: bool,
    pub layout_done: bool,
}

impl Default for LayoutEntry {
    fn default() -> Self {
        Self {
            shape: None,
            offset: 0.0,
            dirty: true,
            layout_done: false,
        }
    }
}

/// Summary of one layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutPass {
    /// Nodes in the structure when the pass ran.
    pub nodes: usize,
    /// Nodes the traversal entered.
    pub visited: usize,
    /// Nodes whose shape was rebuilt.
    pub recomputed: usize,
    /// Whether the root's shape differs from the one before the pass.
    pub root_changed: bool,
}

struct Frame {
    node: NodeId,
    next_child: usize,
    child_changed: bool,
}

impl Frame {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            next_child: 0,
            child_changed: false,
        }
    }
}

/// Mutable layout state of one tree. Obtained through [`Layout::lock`].
#[derive(Debug, Default)]
pub struct LayoutState {
    entries: Vec<LayoutEntry>,
    /// Nodes flagged dirty through `set_dirty` whose ancestors have not been
    /// reopened yet.
    pending: Vec<NodeId>,
    /// Node count seen by the previous pass.
    synced: usize,
}

impl LayoutState {
    fn entry(&self, node: NodeId) -> Option<&LayoutEntry> {
        self.entries.get(node.index())
    }

    fn entry_mut(&mut self, node: NodeId) -> &mut LayoutEntry {
        let idx = node.index();
        if self.entries.len() <= idx {
            self.entries.resize_with(idx + 1, LayoutEntry::default);
        }
        &mut self.entries[idx]
    }

    /// Number of materialized entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pre-grow storage for `additional` more nodes.
    pub fn reserve(&mut self, additional: usize) {
        self.entries.reserve(additional);
    }

    pub fn get_shape(&self, node: NodeId) -> Result<&Shape, TreeError> {
        self.entry(node)
            .and_then(|e| e.shape.as_ref())
            .ok_or(TreeError::ShapeNotComputed { node })
    }

    pub fn set_shape(&mut self, node: NodeId, shape: Shape) {
        self.entry_mut(node).shape = Some(shape);
    }

    #[must_use]
    pub fn get_offset(&self, node: NodeId) -> f64 {
        self.entry(node).map_or(0.0, |e| e.offset)
    }

    pub fn set_offset(&mut self, node: NodeId, offset: f64) {
        self.entry_mut(node).offset = offset;
    }

    #[must_use]
    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.entry(node).is_none_or(|e| e.dirty)
    }

    /// Set the dirty flag of `node` alone.
    ///
    /// A node flagged dirty here is never skipped: the next pass reopens its
    /// ancestors before traversing.
    pub fn set_dirty(&mut self, node: NodeId, dirty: bool) {
        let entry = self.entry_mut(node);
        entry.dirty = dirty;
        if dirty {
            entry.layout_done = false;
            self.pending.push(node);
        }
    }

    #[must_use]
    pub fn get_layout_done(&self, node: NodeId) -> bool {
        self.entry(node).is_some_and(|e| e.layout_done)
    }

    pub fn set_layout_done(&mut self, node: NodeId, done: bool) {
        self.entry_mut(node).layout_done = done;
    }

    /// Mark `node` dirty and propagate up the parent chain.
    ///
    /// Propagation stops at the first ancestor that is already dirty; its own
    /// ancestors were reopened when it was marked. Returns the number of
    /// nodes whose flag changed.
    pub fn mark_dirty(&mut self, view: &StructureView<'_>, node: NodeId) -> usize {
        let mut marked = 0;
        let entry = self.entry_mut(node);
        if !entry.dirty {
            marked += 1;
        }
        entry.dirty = true;
        entry.layout_done = false;

        let mut current = view.parent(node).ok().flatten();
        while let Some(ancestor) = current {
            let entry = self.entry_mut(ancestor);
            if entry.dirty {
                break;
            }
            entry.dirty = true;
            entry.layout_done = false;
            marked += 1;
            current = view.parent(ancestor).ok().flatten();
        }
        marked
    }

    // Nodes appended since the previous pass, and nodes flagged through
    // `set_dirty`, may sit below ancestors still marked done. Reopen those
    // chains so the traversal reaches them.
    fn reopen_pending(&mut self, view: &StructureView<'_>) {
        let count = view.node_count();
        let fresh = (self.synced.min(count)..count).map(|i| NodeId::new(i as u32));
        let starts: Vec<NodeId> = std::mem::take(&mut self.pending)
            .into_iter()
            .filter(|n| view.contains(*n))
            .chain(fresh)
            .collect();

        for node in starts {
            let mut current = view.parent(node).ok().flatten();
            while let Some(ancestor) = current {
                let entry = self.entry_mut(ancestor);
                if !entry.layout_done {
                    break;
                }
                entry.layout_done = false;
                current = view.parent(ancestor).ok().flatten();
            }
        }
        self.synced = count;
    }

    fn needs_visit(&self, node: NodeId) -> bool {
        self.entry(node)
            .is_none_or(|e| e.dirty || !e.layout_done || e.shape.is_none())
    }

    // Rebuild one node from its children's current shapes. Returns whether
    // the stored shape changed.
    fn relayout(
        &mut self,
        view: &StructureView<'_>,
        node: NodeId,
        child_changed: bool,
        min_separation: f64,
    ) -> Option<bool> {
        let stale = self
            .entry(node)
            .is_none_or(|e| e.dirty || e.shape.is_none());
        if !stale && !child_changed {
            self.entry_mut(node).layout_done = true;
            return None;
        }

        let children = view.children(node).unwrap_or_default();
        let shapes: Vec<Shape> = children
            .iter()
            .map(|c| {
                self.entry(*c)
                    .and_then(|e| e.shape.clone())
                    .unwrap_or_default()
            })
            .collect();
        let (shape, offsets) = Shape::combine(&shapes, min_separation);
        for (child, offset) in children.iter().zip(offsets) {
            self.entry_mut(*child).offset = offset;
        }

        let entry = self.entry_mut(node);
        let changed = entry.shape.as_ref() != Some(&shape);
        entry.shape = Some(shape);
        entry.dirty = false;
        entry.layout_done = true;
        Some(changed)
    }

    /// Recompute every stale shape, bottom-up.
    ///
    /// A node is rebuilt iff it is dirty, has no shape yet, or one of its
    /// children's shapes changed during this pass. Subtrees whose root is
    /// clean and done are skipped entirely.
    pub fn update(&mut self, view: &StructureView<'_>, min_separation: f64) -> LayoutPass {
        let mut pass = LayoutPass {
            nodes: view.node_count(),
            ..LayoutPass::default()
        };
        let Some(root) = view.root() else {
            return pass;
        };
        self.reopen_pending(view);
        if !self.needs_visit(root) {
            return pass;
        }

        let mut stack = vec![Frame::new(root)];
        loop {
            let Some(top) = stack.last_mut() else {
                break;
            };
            let children = view.children(top.node).unwrap_or_default();
            if let Some(&child) = children.get(top.next_child) {
                top.next_child += 1;
                if self.needs_visit(child) {
                    stack.push(Frame::new(child));
                }
                continue;
            }

            let Some(frame) = stack.pop() else {
                break;
            };
            pass.visited += 1;
            let changed = match self.relayout(view, frame.node, frame.child_changed, min_separation)
            {
                Some(changed) => {
                    pass.recomputed += 1;
                    changed
                }
                None => false,
            };
            match stack.last_mut() {
                Some(parent) => parent.child_changed |= changed,
                None => pass.root_changed = changed,
            }
        }
        pass
    }
}

/// Geometry cache of one tree, guarded by a single mutex.
#[derive(Debug, Default)]
pub struct Layout {
    state: Mutex<LayoutState>,
}

impl Layout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the whole layout state.
    ///
    /// Every mutation leaves the state consistent, so a poisoned mutex is
    /// recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, LayoutState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last stored shape of `node`.
    pub fn get_shape(&self, node: NodeId) -> Result<Shape, TreeError> {
        self.lock().get_shape(node).cloned()
    }

    /// Number of levels in the subtree of `node`.
    pub fn get_depth(&self, node: NodeId) -> Result<usize, TreeError> {
        self.lock().get_shape(node).map(Shape::depth)
    }

    pub fn get_bounding_box(&self, node: NodeId) -> Result<BoundingBox, TreeError> {
        self.lock().get_shape(node).map(Shape::bounding_box)
    }

    #[must_use]
    pub fn get_offset(&self, node: NodeId) -> f64 {
        self.lock().get_offset(node)
    }

    #[must_use]
    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.lock().is_dirty(node)
    }

    #[must_use]
    pub fn get_layout_done(&self, node: NodeId) -> bool {
        self.lock().get_layout_done(node)
    }

    /// Horizontal position of `node` relative to the root.
    pub fn absolute_x(&self, structure: &Structure, node: NodeId) -> Result<f64, TreeError> {
        let state = self.lock();
        let view = structure.read();
        let mut x = 0.0;
        let mut current = Some(node);
        while let Some(n) = current {
            x += state.get_offset(n);
            current = view.parent(n)?;
        }
        Ok(x)
    }

    /// Run one layout pass against `structure`, holding the mutex throughout.
    pub fn update(&self, structure: &Structure, min_separation: f64) -> LayoutPass {
        let mut state = self.lock();
        let view = structure.read();

        let _span = debug_span!(
            "cptree.layout.update",
            nodes = view.node_count(),
            visited = tracing::field::Empty,
            recomputed = tracing::field::Empty,
            duration_us = tracing::field::Empty
        )
        .entered();
        let start = Instant::now();
        let pass = state.update(&view, min_separation);
        let span = tracing::Span::current();
        span.record("visited", pass.visited);
        span.record("recomputed", pass.recomputed);
        span.record("duration_us", start.elapsed().as_micros() as u64);
        pass
    }
}
