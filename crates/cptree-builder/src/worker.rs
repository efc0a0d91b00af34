//! Background builder thread.
//!
//! [`TreeBuilder::spawn`] moves a builder onto its own named thread fed by a
//! bounded channel. The connection layer keeps the [`BuilderHandle`] and
//! pushes events as they arrive; readers keep an `Arc<Tree>` and query it
//! concurrently.
//!
//! Dropping the handle closes the channel without waiting: the thread drains
//! what was already queued and exits on its own.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use cptree_core::Tree;
use tracing::debug;

use crate::builder::{BuildSummary, BuilderState, TreeBuilder};
use crate::event::NodeEvent;

/// Failure to talk to a builder thread.
#[derive(Debug)]
pub enum BuilderError {
    /// The builder thread is gone; the event was not delivered.
    Disconnected,
    /// The builder thread panicked.
    WorkerPanicked,
    /// The builder thread could not be started.
    Spawn(std::io::Error),
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "builder thread disconnected"),
            Self::WorkerPanicked => write!(f, "builder thread panicked"),
            Self::Spawn(e) => write!(f, "failed to spawn builder thread: {e}"),
        }
    }
}

impl std::error::Error for BuilderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Cloneable sender into a builder thread.
///
/// Holding one keeps the channel open, so drop every clone before calling
/// [`BuilderHandle::finish`] or it waits on them.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: SyncSender<NodeEvent>,
}

impl EventSender {
    /// Queue one event. Blocks while the channel is full.
    pub fn send(&self, event: NodeEvent) -> Result<(), BuilderError> {
        self.sender
            .send(event)
            .map_err(|_| BuilderError::Disconnected)
    }
}

/// Sending half of a running builder thread.
#[derive(Debug)]
pub struct BuilderHandle {
    sender: Option<SyncSender<NodeEvent>>,
    thread: Option<JoinHandle<BuildSummary>>,
    tree: Arc<Tree>,
}

impl BuilderHandle {
    /// Queue one event. Blocks while the channel is full.
    pub fn send(&self, event: NodeEvent) -> Result<(), BuilderError> {
        let sender = self.sender.as_ref().ok_or(BuilderError::Disconnected)?;
        sender.send(event).map_err(|_| BuilderError::Disconnected)
    }

    /// A sender that can be used without borrowing the handle.
    pub fn sender(&self) -> Result<EventSender, BuilderError> {
        let sender = self.sender.as_ref().ok_or(BuilderError::Disconnected)?;
        Ok(EventSender {
            sender: sender.clone(),
        })
    }

    /// The tree being built.
    #[must_use]
    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    /// Close the stream and wait for the builder to drain it.
    pub fn finish(mut self) -> Result<BuildSummary, BuilderError> {
        self.sender.take();
        let thread = self.thread.take().ok_or(BuilderError::WorkerPanicked)?;
        thread.join().map_err(|_| BuilderError::WorkerPanicked)
    }
}

impl Drop for BuilderHandle {
    fn drop(&mut self) {
        // Closing the channel is enough; the thread exits after draining.
        self.sender.take();
    }
}

impl TreeBuilder {
    /// Run this builder on a dedicated thread.
    ///
    /// `capacity` bounds the event channel; senders block when it is full.
    pub fn spawn(self, capacity: usize) -> Result<BuilderHandle, BuilderError> {
        let tree = Arc::clone(self.tree());
        let (tx, rx) = mpsc::sync_channel::<NodeEvent>(capacity.max(1));
        let thread = thread::Builder::new()
            .name("cptree-builder".into())
            .spawn(move || builder_loop(self, rx))
            .map_err(BuilderError::Spawn)?;
        Ok(BuilderHandle {
            sender: Some(tx),
            thread: Some(thread),
            tree,
        })
    }
}

fn builder_loop(mut builder: TreeBuilder, rx: Receiver<NodeEvent>) -> BuildSummary {
    for event in rx {
        // Rejections are logged and counted by the builder itself.
        let _ = builder.handle(event);
    }
    if builder.state() == BuilderState::Building {
        debug!("event stream closed before done");
    }
    builder.finish()
}
