#![forbid(unsafe_code)]

//! Search-tree profiling facade.
//!
//! Re-exports the tree core, the event-driven builder, and the merger, and
//! adds the execution registry ([`Conductor`]) that ties them together.
//!
//! ```
//! use cptree::prelude::*;
//!
//! let conductor = Conductor::default();
//! let id = conductor.start("queens", 0, false)?;
//! conductor.handle(id, NodeEvent::root(Status::Branch))?;
//! conductor.handle(id, NodeEvent::child(NodeId::ROOT, 0, Status::Solution))?;
//! conductor.finish(id)?;
//!
//! let tree = conductor.tree(id).expect("registered");
//! tree.update_layout(conductor.config().layout.min_separation);
//! assert_eq!(tree.layout().get_depth(NodeId::ROOT)?, 2);
//! # Ok::<(), cptree::Error>(())
//! ```

use std::fmt;

pub mod conductor;
#[cfg(feature = "logging")]
pub mod logging;

// --- Core re-exports -------------------------------------------------------

pub use cptree_core::{
    BoundingBox, BuilderConfig, ConfigError, Extent, LabelLookup, Layout, LayoutConfig,
    LayoutPass, MergeConfig, NodeId, ProfilerConfig, Shape, Status, Structure, Tree, TreeError,
};

// --- Builder re-exports ----------------------------------------------------

pub use cptree_builder::{
    BuildSummary, BuilderError, BuilderHandle, BuilderState, EventOutcome, EventSender,
    MalformedEvent, NodeEvent, TreeBuilder,
};

// --- Merge re-exports ------------------------------------------------------

pub use cptree_merge::{
    Classification, MergeError, MergeHandle, MergeOutcome, MergeResult, StatusMismatch,
    TreeMerger, TreeSnapshot,
};

pub use conductor::{Conductor, ExecutionId, ExecutionInfo};

// --- Errors ---------------------------------------------------------------

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    Tree(TreeError),
    Malformed(MalformedEvent),
    Builder(BuilderError),
    Merge(MergeError),
    Config(ConfigError),
    /// No execution is registered under this id.
    UnknownExecution(ExecutionId),
    /// The execution's event stream is already closed.
    ExecutionFinished(ExecutionId),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree(err) => write!(f, "{err}"),
            Self::Malformed(err) => write!(f, "malformed event: {err}"),
            Self::Builder(err) => write!(f, "{err}"),
            Self::Merge(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "configuration: {err}"),
            Self::UnknownExecution(id) => write!(f, "unknown execution {id}"),
            Self::ExecutionFinished(id) => write!(f, "execution {id} already finished"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            Self::Malformed(err) => Some(err),
            Self::Builder(err) => Some(err),
            Self::Merge(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::UnknownExecution(_) | Self::ExecutionFinished(_) => None,
        }
    }
}

impl From<TreeError> for Error {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl From<MalformedEvent> for Error {
    fn from(err: MalformedEvent) -> Self {
        Self::Malformed(err)
    }
}

impl From<BuilderError> for Error {
    fn from(err: BuilderError) -> Self {
        Self::Builder(err)
    }
}

impl From<MergeError> for Error {
    fn from(err: MergeError) -> Self {
        Self::Merge(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Standard result type for cptree APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Classification, Conductor, Error, ExecutionId, LabelLookup, MergeResult, NodeEvent,
        NodeId, ProfilerConfig, Result, Shape, Status, Tree, TreeBuilder, TreeMerger,
    };

    pub use crate::{builder, core, merge};
}

pub use cptree_builder as builder;
pub use cptree_core as core;
pub use cptree_merge as merge;
