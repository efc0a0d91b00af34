//! Node identity and solver status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense identifier of a node within one tree.
///
/// Ids are handed out in arrival order and never reused. A parent is always
/// created before its children, so `parent.index() < child.index()` holds
/// for every edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The root of every tree.
    pub const ROOT: Self = Self(0);

    /// Create an id from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Position in per-node arenas.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Solver verdict for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Internal choice point.
    Branch,
    /// A solution was found here.
    Solution,
    /// The subproblem failed.
    Failure,
    /// Not explored (e.g. pruned by a bound).
    Skipped,
    /// Not reported yet.
    #[default]
    Undetermined,
}

impl Status {
    /// Stable lowercase name for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Solution => "solution",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
            Self::Undetermined => "undetermined",
        }
    }

    /// Whether the status ends a path of the search.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Solution | Self::Failure | Self::Skipped)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
