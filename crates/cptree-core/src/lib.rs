#![forbid(unsafe_code)]

//! Core: search-tree topology, subtree shapes, and incremental layout.
//!
//! - [`Structure`] - append-only topology, one writer and many readers
//! - [`Shape`] - per-depth silhouette of a subtree
//! - [`Layout`] - per-tree cache of shapes, offsets, and dirty state
//! - [`Tree`] - the `Structure` + `Layout` pair owned by one execution
//! - [`LabelLookup`] - collaborator-supplied branch labels
//! - [`config`] - profiler configuration

pub mod config;
pub mod error;
pub mod label;
pub mod layout;
pub mod node;
pub mod shape;
pub mod structure;
pub mod tree;

pub use config::{BuilderConfig, ConfigError, LayoutConfig, MergeConfig, ProfilerConfig};
pub use error::TreeError;
pub use label::LabelLookup;
pub use layout::{Layout, LayoutEntry, LayoutPass, LayoutState};
pub use node::{NodeId, Status};
pub use shape::{BoundingBox, Extent, Shape};
pub use structure::{Structure, StructureView};
pub use tree::Tree;
