//! Observation hooks for graph evaluation.

use crate::graph::{Graph, NodeId, OutputSocketId, SocketRef};
use crate::value::Value;

/// Receives events during graph evaluation. Every hook defaults to a no-op.
///
/// Hooks may be called from several threads at once.
pub trait ExecutorLogger: Send + Sync {
    /// A value was forwarded from or into a socket, or a default was loaded.
    fn log_socket_value(&self, graph: &Graph<'_>, socket: SocketRef, value: &Value) {
        let _ = (graph, socket, value);
    }

    /// A function node is about to run.
    fn log_before_node_execute(&self, graph: &Graph<'_>, node: NodeId) {
        let _ = (graph, node);
    }

    /// A function node returned.
    fn log_after_node_execute(&self, graph: &Graph<'_>, node: NodeId) {
        let _ = (graph, node);
    }

    /// A node returned without computing outputs that were required, and
    /// without waiting for any input.
    fn dump_when_outputs_are_missing(&self, graph: &Graph<'_>, node: NodeId, missing: &[OutputSocketId]) {
        let _ = (graph, node, missing);
    }
}

/// Forwards evaluation events to `tracing`.
#[cfg(feature = "tracing")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

#[cfg(feature = "tracing")]
impl ExecutorLogger for TracingLogger {
    fn log_socket_value(&self, graph: &Graph<'_>, socket: SocketRef, value: &Value) {
        let (name, value_type) = match socket {
            SocketRef::Input(id) => (graph.input_detailed_name(id), graph.input(id).value_type()),
            SocketRef::Output(id) => (graph.output_detailed_name(id), graph.output(id).value_type()),
        };
        match value_type.format(value) {
            Some(text) => tracing::trace!("socket {name} = {text}"),
            None => tracing::trace!("socket {name} = <{value_type}>"),
        }
    }

    fn log_before_node_execute(&self, graph: &Graph<'_>, node: NodeId) {
        tracing::trace!("execute {} ({node})", graph.node(node).name());
    }

    fn log_after_node_execute(&self, graph: &Graph<'_>, node: NodeId) {
        tracing::trace!("executed {} ({node})", graph.node(node).name());
    }

    fn dump_when_outputs_are_missing(&self, graph: &Graph<'_>, node: NodeId, missing: &[OutputSocketId]) {
        let names: Vec<String> = missing.iter().map(|id| graph.output_name(*id)).collect();
        tracing::error!(
            "node {} ({node}) did not compute required outputs: {}",
            graph.node(node).name(),
            names.join(", ")
        );
    }
}
