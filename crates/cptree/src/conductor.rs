//! Execution registry.
//!
//! A [`Conductor`] owns every execution the profiler knows about. Each
//! execution holds one [`Tree`] and the builder thread that writes it.
//! Connections announce themselves with [`Conductor::start`], stream node
//! events through [`Conductor::handle`], and close with [`Conductor::finish`].
//! Two executions can be compared with [`Conductor::merge`].
//!
//! A known non-zero id passed to `start` joins the existing execution, so
//! restarts and multiple connections of one solver run feed a single
//! builder. Id `0` asks the registry to allocate one.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cptree_builder::{BuildSummary, BuilderHandle, NodeEvent, TreeBuilder};
use cptree_core::{LabelLookup, LayoutPass, ProfilerConfig, Tree};
use cptree_merge::{MergeHandle, TreeMerger};
use tracing::{debug, info};

use crate::{Error, Result};

/// Registry key of an execution. `0` is reserved for "allocate one".
pub type ExecutionId = u32;

struct Execution {
    name: String,
    restarts: bool,
    connections: usize,
    tree: Arc<Tree>,
    builder: Option<BuilderHandle>,
    labels: Option<Arc<dyn LabelLookup>>,
    summary: Option<BuildSummary>,
}

/// Read-only view of one registered execution.
#[derive(Debug, Clone)]
pub struct ExecutionInfo {
    pub id: ExecutionId,
    pub name: String,
    pub restarts: bool,
    pub connections: usize,
    pub nodes: usize,
    /// Set once the builder has finished.
    pub summary: Option<BuildSummary>,
    pub has_labels: bool,
}

/// Registry of executions and their builders.
pub struct Conductor {
    config: ProfilerConfig,
    executions: Mutex<BTreeMap<ExecutionId, Execution>>,
}

impl std::fmt::Debug for Conductor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conductor")
            .field("config", &self.config)
            .field("executions", &self.ids())
            .finish()
    }
}

impl Default for Conductor {
    fn default() -> Self {
        Self::new(ProfilerConfig::default())
    }
}

impl Conductor {
    #[must_use]
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            executions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load configuration from `path` (missing file = defaults), apply
    /// environment overrides, and validate.
    pub fn from_config_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = ProfilerConfig::from_path(path)?.with_env_overrides()?;
        config.validate()?;
        Ok(Self::new(config))
    }

    #[must_use]
    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    // Registry entries are only replaced whole, so a poisoned map is still
    // consistent.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<ExecutionId, Execution>> {
        self.executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Smallest id not currently in use.
    #[must_use]
    pub fn next_execution_id(&self) -> ExecutionId {
        smallest_unused(&self.lock())
    }

    /// Register a connection for execution `id`.
    ///
    /// Returns the id the connection should use from now on: `id` itself
    /// when it is non-zero, or a freshly allocated one.
    pub fn start(&self, name: &str, id: ExecutionId, restarts: bool) -> Result<ExecutionId> {
        let mut executions = self.lock();
        if id != 0 {
            if let Some(execution) = executions.get_mut(&id) {
                execution.connections += 1;
                info!(
                    execution = id,
                    connections = execution.connections,
                    "connection joined existing execution"
                );
                return Ok(id);
            }
        }
        let id = if id == 0 {
            smallest_unused(&executions)
        } else {
            id
        };
        let execution = self.create(name, restarts)?;
        info!(execution = id, name, restarts, "execution created");
        executions.insert(id, execution);
        Ok(id)
    }

    fn create(&self, name: &str, restarts: bool) -> Result<Execution> {
        let tree = Arc::new(Tree::new());
        let builder = TreeBuilder::new(Arc::clone(&tree), &self.config.builder)
            .with_label(name)
            .spawn(self.config.builder.channel_capacity)?;
        Ok(Execution {
            name: name.to_string(),
            restarts,
            connections: 1,
            tree,
            builder: Some(builder),
            labels: None,
            summary: None,
        })
    }

    /// Forward one event to the execution's builder.
    ///
    /// An unknown non-zero id creates an unnamed execution on the spot. The
    /// call blocks while the builder's channel is full, but only this
    /// execution's callers wait.
    pub fn handle(&self, id: ExecutionId, event: NodeEvent) -> Result<()> {
        let sender = {
            let mut executions = self.lock();
            if id != 0 && !executions.contains_key(&id) {
                let execution = self.create(&format!("execution {id}"), false)?;
                info!(execution = id, "execution created by first event");
                executions.insert(id, execution);
            }
            let execution = executions.get(&id).ok_or(Error::UnknownExecution(id))?;
            let builder = execution.builder.as_ref().ok_or(Error::ExecutionFinished(id))?;
            builder.sender()?
        };
        sender.send(event)?;
        Ok(())
    }

    /// Close the execution's event stream and wait for its builder.
    pub fn finish(&self, id: ExecutionId) -> Result<BuildSummary> {
        // Take the handle out so the join happens without the registry lock.
        let builder = {
            let mut executions = self.lock();
            let execution = executions
                .get_mut(&id)
                .ok_or(Error::UnknownExecution(id))?;
            execution
                .builder
                .take()
                .ok_or(Error::ExecutionFinished(id))?
        };
        let summary = builder.finish()?;
        debug!(
            execution = id,
            nodes = summary.nodes,
            malformed = summary.malformed,
            "execution finished"
        );
        if let Some(execution) = self.lock().get_mut(&id) {
            execution.summary = Some(summary);
        }
        Ok(summary)
    }

    /// Drop an execution and its tree. A running builder drains and exits.
    pub fn discard(&self, id: ExecutionId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            info!(execution = id, "execution discarded");
        }
        removed
    }

    #[must_use]
    pub fn get(&self, id: ExecutionId) -> Option<ExecutionInfo> {
        self.lock().get(&id).map(|e| ExecutionInfo {
            id,
            name: e.name.clone(),
            restarts: e.restarts,
            connections: e.connections,
            nodes: e.tree.node_count(),
            summary: e.summary,
            has_labels: e.labels.is_some(),
        })
    }

    /// The execution's tree, for geometry queries.
    #[must_use]
    pub fn tree(&self, id: ExecutionId) -> Option<Arc<Tree>> {
        self.lock().get(&id).map(|e| Arc::clone(&e.tree))
    }

    /// Bring the execution's layout up to date with the configured
    /// separation.
    pub fn update_layout(&self, id: ExecutionId) -> Result<LayoutPass> {
        let tree = self.tree(id).ok_or(Error::UnknownExecution(id))?;
        Ok(tree.update_layout(self.config.layout.min_separation))
    }

    #[must_use]
    pub fn ids(&self) -> Vec<ExecutionId> {
        self.lock().keys().copied().collect()
    }

    /// Attach branch labels to an execution.
    pub fn set_name_map(&self, id: ExecutionId, labels: Arc<dyn LabelLookup>) -> Result<()> {
        let mut executions = self.lock();
        let execution = executions
            .get_mut(&id)
            .ok_or(Error::UnknownExecution(id))?;
        execution.labels = Some(labels);
        Ok(())
    }

    /// Start merging two executions on a worker thread.
    ///
    /// Each call starts an independent merge; the trees are read as they are
    /// when the worker snapshots them.
    pub fn merge(&self, a: ExecutionId, b: ExecutionId) -> Result<MergeHandle> {
        let (tree_a, labels_a, tree_b, labels_b) = {
            let executions = self.lock();
            let ea = executions.get(&a).ok_or(Error::UnknownExecution(a))?;
            let eb = executions.get(&b).ok_or(Error::UnknownExecution(b))?;
            (
                Arc::clone(&ea.tree),
                ea.labels.clone(),
                Arc::clone(&eb.tree),
                eb.labels.clone(),
            )
        };
        info!(a, b, "merge requested");
        Ok(TreeMerger::new(tree_a, tree_b)
            .with_labels(labels_a, labels_b)
            .with_config(&self.config.merge)
            .start())
    }
}

fn smallest_unused(executions: &BTreeMap<ExecutionId, Execution>) -> ExecutionId {
    // Keys are sorted; the first gap after 0 is the answer.
    let mut next = 1;
    for &id in executions.keys() {
        if id == next {
            next += 1;
        } else if id > next {
            break;
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use cptree_core::{NodeId, Status};

    #[test]
    fn ids_fill_gaps() {
        let c = Conductor::default();
        assert_eq!(c.next_execution_id(), 1);
        assert_eq!(c.start("a", 0, false).unwrap(), 1);
        assert_eq!(c.start("b", 0, false).unwrap(), 2);
        assert_eq!(c.start("c", 7, false).unwrap(), 7);
        assert_eq!(c.next_execution_id(), 3);
        assert!(c.discard(1));
        assert_eq!(c.next_execution_id(), 1);
        assert_eq!(c.ids(), vec![2, 7]);
        assert!(!c.discard(1));
    }

    #[test]
    fn known_id_joins_existing_execution() {
        let c = Conductor::default();
        let id = c.start("restarting", 5, true).unwrap();
        c.handle(id, NodeEvent::root(Status::Branch)).unwrap();
        assert_eq!(c.start("ignored", 5, true).unwrap(), 5);
        c.handle(id, NodeEvent::child(NodeId::ROOT, 0, Status::Failure))
            .unwrap();

        let summary = c.finish(id).unwrap();
        assert_eq!(summary.nodes, 2);
        let info = c.get(id).unwrap();
        assert_eq!(info.name, "restarting");
        assert_eq!(info.connections, 2);
        assert!(info.restarts);
        assert_eq!(info.summary, Some(summary));
    }

    #[test]
    fn first_event_creates_execution() {
        let c = Conductor::default();
        c.handle(9, NodeEvent::root(Status::Solution)).unwrap();
        assert_eq!(c.ids(), vec![9]);
        assert_eq!(c.get(9).unwrap().name, "execution 9");
        assert!(matches!(
            c.handle(0, NodeEvent::Done),
            Err(Error::UnknownExecution(0))
        ));
    }

    #[test]
    fn finished_execution_rejects_events() {
        let c = Conductor::default();
        let id = c.start("once", 0, false).unwrap();
        c.finish(id).unwrap();
        assert!(matches!(
            c.handle(id, NodeEvent::Done),
            Err(Error::ExecutionFinished(_))
        ));
        assert!(matches!(c.finish(id), Err(Error::ExecutionFinished(_))));
        assert!(matches!(c.finish(42), Err(Error::UnknownExecution(42))));
    }
}
