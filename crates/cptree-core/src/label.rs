//! Branch labels supplied by a collaborator (e.g. a solver's name map).

use std::collections::HashMap;

use crate::node::NodeId;

/// Maps the `alt`-th branch of `node` to a human-readable label.
///
/// The core never parses label sources; callers hand in any lookup they
/// like. Closures of the matching signature implement the trait.
pub trait LabelLookup: Send + Sync {
    fn label(&self, node: NodeId, alt: u32) -> Option<String>;
}

impl<F> LabelLookup for F
where
    F: Fn(NodeId, u32) -> Option<String> + Send + Sync,
{
    fn label(&self, node: NodeId, alt: u32) -> Option<String> {
        self(node, alt)
    }
}

impl LabelLookup for HashMap<(NodeId, u32), String> {
    fn label(&self, node: NodeId, alt: u32) -> Option<String> {
        self.get(&(node, alt)).cloned()
    }
}
