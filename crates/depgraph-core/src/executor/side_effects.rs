//! Nodes that have to run even when none of their outputs are used.

use crate::graph::NodeId;
use crate::params::Context;

/// Decides which nodes have side effects in a given evaluation.
///
/// Queried once, at the start of each logical evaluation.
pub trait SideEffectProvider: Send + Sync {
    /// Returns the function nodes that must run.
    fn get_nodes_with_side_effects(&self, context: &Context<'_>) -> Vec<NodeId>;
}

/// A fixed set of side-effect nodes.
#[derive(Debug, Clone, Default)]
pub struct StaticSideEffects(pub Vec<NodeId>);

impl SideEffectProvider for StaticSideEffects {
    fn get_nodes_with_side_effects(&self, _context: &Context<'_>) -> Vec<NodeId> {
        self.0.clone()
    }
}
