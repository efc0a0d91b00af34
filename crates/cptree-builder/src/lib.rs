#![forbid(unsafe_code)]

//! Tree builder: applies a solver's node event stream to a [`Tree`].
//!
//! One builder per execution is the tree's only writer. It can run inline
//! ([`TreeBuilder::handle`]) or on its own thread ([`TreeBuilder::spawn`]).
//!
//! [`Tree`]: cptree_core::Tree

pub mod builder;
pub mod event;
pub mod worker;

pub use builder::{BuildSummary, BuilderState, EventOutcome, MalformedEvent, TreeBuilder};
pub use event::NodeEvent;
pub use worker::{BuilderError, BuilderHandle, EventSender};
