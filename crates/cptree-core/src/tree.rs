//! The topology + geometry pair owned by one execution.

use crate::layout::{Layout, LayoutPass, LayoutState};
use crate::node::NodeId;
use crate::structure::{Structure, StructureView};

/// A search tree together with its layout cache.
///
/// Both halves are created together and dropped together. Share a tree
/// between the builder and its readers with `Arc<Tree>`.
#[derive(Debug, Default)]
pub struct Tree {
    structure: Structure,
    layout: Layout,
}

impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let tree = Self {
            structure: Structure::with_capacity(capacity),
            layout: Layout::new(),
        };
        tree.layout.lock().reserve(capacity);
        tree
    }

    #[must_use]
    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.structure.node_count()
    }

    /// Mark `node` and its not-yet-dirty ancestors dirty.
    pub fn mark_dirty(&self, node: NodeId) -> usize {
        let mut state = self.layout.lock();
        let view = self.structure.read();
        state.mark_dirty(&view, node)
    }

    /// Read layout and topology together.
    ///
    /// Takes the layout mutex, then the structure view, which is the only
    /// order that cannot deadlock against a layout pass.
    pub fn with_geometry<R>(&self, f: impl FnOnce(&LayoutState, &StructureView<'_>) -> R) -> R {
        let state = self.layout.lock();
        let view = self.structure.read();
        f(&state, &view)
    }

    /// Bring every shape up to date.
    pub fn update_layout(&self, min_separation: f64) -> LayoutPass {
        self.layout.update(&self.structure, min_separation)
    }
}
