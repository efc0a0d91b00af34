#![forbid(unsafe_code)]

//! Merge two search trees into one annotated tree.
//!
//! ```
//! use std::sync::Arc;
//! use cptree_core::{NodeId, Tree};
//! use cptree_merge::{Classification, TreeMerger};
//!
//! let a = Arc::new(Tree::new());
//! a.structure().create_root().unwrap();
//! let b = Arc::new(Tree::new());
//! b.structure().create_root().unwrap();
//! b.structure().add_extra_child(NodeId::ROOT).unwrap();
//!
//! let merged = TreeMerger::new(a, b).start().wait().unwrap();
//! assert_eq!(
//!     merged.result.classification(NodeId::new(1)),
//!     Some(Classification::OnlyInB)
//! );
//! ```

pub mod merger;
pub mod report;
pub mod snapshot;

pub use merger::{MergeError, MergeHandle, MergeOutcome, TreeMerger};
pub use report::{Classification, MergeResult, MergedNode, StatusMismatch};
pub use snapshot::TreeSnapshot;
