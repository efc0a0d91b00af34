//! Structural merge of two search trees.
//!
//! Both trees are walked depth-first from their roots. Children at the same
//! alternative index are paired when their branch labels agree; a pair whose
//! labels differ, and any children beyond the shorter list, are copied over
//! whole and tagged with the tree they came from.
//!
//! Without label lookups for both trees every shared index pairs up. That
//! positional fallback cannot tell `x = 1` from `x = 2` on the same branch.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;

use cptree_core::{LabelLookup, MergeConfig, NodeId, Status, Tree, TreeError};
use tracing::{error, info, info_span};

use crate::report::{Classification, MergeResult, MergedNode, StatusMismatch};
use crate::snapshot::TreeSnapshot;

/// Failure of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeError {
    /// The merge worker exited without producing a result.
    WorkerLost,
    /// A source tree has no root.
    EmptyTree,
    /// The merged tree rejected a node.
    Tree(TreeError),
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkerLost => write!(f, "merge worker lost"),
            Self::EmptyTree => write!(f, "cannot merge an empty tree"),
            Self::Tree(err) => write!(f, "building merged tree: {err}"),
        }
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TreeError> for MergeError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

/// A merged tree and its per-node report.
#[derive(Debug)]
pub struct MergeOutcome {
    pub tree: Arc<Tree>,
    pub result: MergeResult,
}

type Labels = Option<Arc<dyn LabelLookup>>;

/// One merge job over two trees.
pub struct TreeMerger {
    a: Arc<Tree>,
    b: Arc<Tree>,
    labels_a: Labels,
    labels_b: Labels,
    thread_name: String,
}

impl fmt::Debug for TreeMerger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeMerger")
            .field("a_nodes", &self.a.node_count())
            .field("b_nodes", &self.b.node_count())
            .field("labels_a", &self.labels_a.is_some())
            .field("labels_b", &self.labels_b.is_some())
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

enum Step {
    Pair {
        a: NodeId,
        b: NodeId,
        parent: Option<NodeId>,
    },
    Copy {
        from: Classification,
        node: NodeId,
        parent: Option<NodeId>,
    },
}

impl TreeMerger {
    #[must_use]
    pub fn new(a: Arc<Tree>, b: Arc<Tree>) -> Self {
        Self {
            a,
            b,
            labels_a: None,
            labels_b: None,
            thread_name: MergeConfig::default().thread_name,
        }
    }

    /// Branch labels for each tree. Labels only take effect when both are set.
    #[must_use]
    pub fn with_labels(mut self, labels_a: Labels, labels_b: Labels) -> Self {
        self.labels_a = labels_a;
        self.labels_b = labels_b;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: &MergeConfig) -> Self {
        self.thread_name.clone_from(&config.thread_name);
        self
    }

    fn labels_match(&self, a: NodeId, b: NodeId, alt: u32) -> bool {
        match (&self.labels_a, &self.labels_b) {
            (Some(la), Some(lb)) => la.label(a, alt) == lb.label(b, alt),
            _ => true,
        }
    }

    /// Run the merge on the calling thread.
    pub fn merge(&self) -> Result<MergeOutcome, MergeError> {
        let started = Instant::now();
        // Each source is copied under its own guard; no two trees are locked
        // at once.
        let snap_a = TreeSnapshot::of(&self.a);
        let snap_b = TreeSnapshot::of(&self.b);
        let _span = info_span!("cptree.merge", a_nodes = snap_a.len(), b_nodes = snap_b.len())
            .entered();

        let (Some(root_a), Some(root_b)) = (snap_a.root(), snap_b.root()) else {
            return Err(MergeError::EmptyTree);
        };

        let tree = Tree::with_capacity(snap_a.len().max(snap_b.len()));
        let mut result = MergeResult::default();
        let mut stack = vec![Step::Pair {
            a: root_a,
            b: root_b,
            parent: None,
        }];

        while let Some(step) = stack.pop() {
            let mark = stack.len();
            match step {
                Step::Pair { a, b, parent } => {
                    let status_a = snap_a.status(a).unwrap_or_default();
                    let status_b = snap_b.status(b).unwrap_or_default();
                    let merged = emit(&tree, parent, status_a)?;
                    result.push(MergedNode {
                        classification: Classification::IdenticalInBoth,
                        origin_a: Some(a),
                        origin_b: Some(b),
                    });
                    if status_a != status_b {
                        result.push_mismatch(StatusMismatch {
                            merged,
                            status_a,
                            status_b,
                        });
                    }

                    let kids_a = snap_a.children(a);
                    let kids_b = snap_b.children(b);
                    let shared = kids_a.len().min(kids_b.len());
                    for (alt, (&ca, &cb)) in kids_a.iter().zip(kids_b).enumerate() {
                        if self.labels_match(a, b, alt as u32) {
                            stack.push(Step::Pair {
                                a: ca,
                                b: cb,
                                parent: Some(merged),
                            });
                        } else {
                            stack.push(copy(Classification::OnlyInA, ca, merged));
                            stack.push(copy(Classification::OnlyInB, cb, merged));
                        }
                    }
                    for &ca in &kids_a[shared..] {
                        stack.push(copy(Classification::OnlyInA, ca, merged));
                    }
                    for &cb in &kids_b[shared..] {
                        stack.push(copy(Classification::OnlyInB, cb, merged));
                    }
                }
                Step::Copy { from, node, parent } => {
                    let source = match from {
                        Classification::OnlyInB => &snap_b,
                        _ => &snap_a,
                    };
                    let merged = emit(&tree, parent, source.status(node).unwrap_or_default())?;
                    let (origin_a, origin_b) = match from {
                        Classification::OnlyInB => (None, Some(node)),
                        _ => (Some(node), None),
                    };
                    result.push(MergedNode {
                        classification: from,
                        origin_a,
                        origin_b,
                    });
                    for &child in source.children(node) {
                        stack.push(copy(from, child, merged));
                    }
                }
            }
            // Steps were pushed in emission order; flip them so they pop
            // that way and ids come out pre-order.
            stack[mark..].reverse();
        }

        info!(
            nodes = result.len(),
            identical = result.identical,
            only_in_a = result.only_in_a,
            only_in_b = result.only_in_b,
            status_mismatches = result.status_mismatches().len(),
            duration_us = started.elapsed().as_micros() as u64,
            "merge complete"
        );
        Ok(MergeOutcome {
            tree: Arc::new(tree),
            result,
        })
    }

    /// Run the merge on its own named thread.
    ///
    /// The result arrives through the returned handle. Dropping the handle
    /// discards it; the merge itself runs to completion.
    #[must_use]
    pub fn start(self) -> MergeHandle {
        let (tx, rx) = mpsc::sync_channel(1);
        let name = self.thread_name.clone();
        let spawned = thread::Builder::new().name(name).spawn(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.merge())) {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("merge worker panicked");
                    Err(MergeError::WorkerLost)
                }
            };
            // The requester may have gone away.
            let _ = tx.send(outcome);
        });
        if let Err(e) = spawned {
            // The sender died with the closure; the handle reports WorkerLost.
            error!(error = %e, "failed to spawn merge worker");
        }
        MergeHandle { rx }
    }
}

fn copy(from: Classification, node: NodeId, parent: NodeId) -> Step {
    Step::Copy {
        from,
        node,
        parent: Some(parent),
    }
}

fn emit(
    tree: &Tree,
    parent: Option<NodeId>,
    status: Status,
) -> Result<NodeId, MergeError> {
    let structure = tree.structure();
    let node = match parent {
        None => {
            let root = structure.create_root()?;
            structure.set_status(root, status)?;
            root
        }
        Some(parent) => structure.add_child_with_status(parent, status)?,
    };
    Ok(node)
}

/// Receiving end of a merge running on another thread.
#[derive(Debug)]
pub struct MergeHandle {
    rx: Receiver<Result<MergeOutcome, MergeError>>,
}

impl MergeHandle {
    /// Block until the merge finishes.
    pub fn wait(self) -> Result<MergeOutcome, MergeError> {
        self.rx.recv().map_err(|_| MergeError::WorkerLost)?
    }

    /// Take the result if it is ready.
    ///
    /// Returns `None` while the merge is still running. After a result has
    /// been taken, further calls report [`MergeError::WorkerLost`].
    pub fn try_take(&self) -> Option<Result<MergeOutcome, MergeError>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(MergeError::WorkerLost)),
        }
    }
}
