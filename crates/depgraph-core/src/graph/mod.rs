//! Graph of lazy functions.
//!
//! A [`Graph`] links the outputs of [`LazyFunction`]s to the inputs of other
//! lazy functions. It is only the structure; evaluation is done by
//! [`GraphExecutor`](crate::executor::GraphExecutor).
//!
//! # Architecture
//!
//! - Nodes live in an arena (`Vec<Node>`) addressed by [`NodeId`]. Sockets are
//!   addressed by their node and position ([`InputSocketId`],
//!   [`OutputSocketId`]), so links are plain handle pairs.
//! - Nodes 0 and 1 always exist: the graph-input interface node (outputs
//!   only) and the graph-output interface node (inputs only).
//! - Functions are borrowed for `'f`; the graph never owns them.
//! - An input has at most one origin. An output may have many targets.
//! - Cycles are allowed. Whether a cyclic graph can be evaluated depends on
//!   the functions involved.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut graph = Graph::new();
//! let a = graph.add_input(ValueType::of::<i32>(), "a");
//! let node = graph.add_function(&double);
//! let out = graph.add_output(ValueType::of::<i32>(), "out");
//! graph.add_link(a, graph.input_id(node, 0))?;
//! graph.add_link(graph.output_id(node, 0), out)?;
//! graph.update_node_indices();
//! ```

mod dot;
pub mod node;

use thiserror::Error;

use crate::function::LazyFunction;
use crate::value::{Value, ValueType};

pub use dot::{DefaultDotOptions, SocketRef, ToDotOptions};
pub use node::{
    GraphInputSocket, GraphOutputSocket, InputSocket, InputSocketId, Node, NodeId, NodeKind,
    OutputSocket, OutputSocketId,
};

/// Node ID of the graph-input interface node.
pub const GRAPH_INPUT_NODE: NodeId = NodeId(0);
/// Node ID of the graph-output interface node.
pub const GRAPH_OUTPUT_NODE: NodeId = NodeId(1);

/// Errors from graph mutation and lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The specified node was not found in the graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// The specified socket was not found in the graph.
    #[error("socket {0} not found")]
    SocketNotFound(String),
    /// The input already has an origin; it has to be cleared first.
    #[error("input {0} is already linked")]
    InputAlreadyLinked(InputSocketId),
    /// The sockets carry different value types.
    #[error("cannot link a {from} output to a {to} input")]
    TypeMismatch {
        /// Type of the output.
        from: ValueType,
        /// Type of the input.
        to: ValueType,
    },
    /// A default value does not have the socket's type.
    #[error("default value for {socket} is not a {expected}")]
    DefaultValueMismatch {
        /// The input socket.
        socket: InputSocketId,
        /// Type of the socket.
        expected: ValueType,
    },
    /// The operation requires a function node.
    #[error("node {0} is not a function node")]
    NotAFunctionNode(NodeId),
}

/// Arena of lazy-function nodes and the links between their sockets.
pub struct Graph<'f> {
    nodes: Vec<Node<'f>>,
    socket_num: usize,
}

impl Default for Graph<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'f> Graph<'f> {
    /// Creates a graph containing only the two interface nodes.
    pub fn new() -> Self {
        Self {
            nodes: vec![
                Node::interface(GRAPH_INPUT_NODE),
                Node::interface(GRAPH_OUTPUT_NODE),
            ],
            socket_num: 0,
        }
    }

    // --- Mutation ---

    /// Adds a node that runs `function`. Its sockets mirror the function's
    /// declared inputs and outputs.
    pub fn add_function(&mut self, function: &'f dyn LazyFunction) -> NodeId {
        let id = self.next_id();
        self.nodes.push(Node::function(id, function));
        #[cfg(feature = "tracing")]
        tracing::trace!("graph_add_function: {id} ({})", function.name());
        id
    }

    /// Adds a value provided by the caller of the graph.
    pub fn add_input(&mut self, value_type: ValueType, name: impl Into<String>) -> GraphInputSocket {
        let node = &mut self.nodes[GRAPH_INPUT_NODE.slot()];
        let index = node.outputs.len();
        node.outputs.push(OutputSocket::new(value_type, index));
        if let NodeKind::Interface { socket_names } = &mut node.kind {
            socket_names.push(name.into());
        }
        OutputSocketId {
            node: GRAPH_INPUT_NODE,
            index,
        }
    }

    /// Adds a value returned to the caller of the graph.
    pub fn add_output(&mut self, value_type: ValueType, name: impl Into<String>) -> GraphOutputSocket {
        let node = &mut self.nodes[GRAPH_OUTPUT_NODE.slot()];
        let index = node.inputs.len();
        node.inputs.push(InputSocket::new(value_type, index));
        if let NodeKind::Interface { socket_names } = &mut node.kind {
            socket_names.push(name.into());
        }
        InputSocketId {
            node: GRAPH_OUTPUT_NODE,
            index,
        }
    }

    /// Links `from` to `to`.
    ///
    /// Fails without modifying the graph if either socket does not exist, the
    /// input already has an origin, or the value types differ.
    pub fn add_link(&mut self, from: OutputSocketId, to: InputSocketId) -> Result<(), GraphError> {
        let from_type = self.get_output(from)?.value_type;
        let to_socket = self.get_input(to)?;
        if to_socket.origin.is_some() {
            return Err(GraphError::InputAlreadyLinked(to));
        }
        if from_type != to_socket.value_type {
            return Err(GraphError::TypeMismatch {
                from: from_type,
                to: to_socket.value_type,
            });
        }
        self.nodes[to.node.slot()].inputs[to.index].origin = Some(from);
        self.nodes[from.node.slot()].outputs[from.index].targets.push(to);
        #[cfg(feature = "tracing")]
        tracing::trace!("graph_link: {from} -> {to}");
        Ok(())
    }

    /// Removes the link into `to`, if any.
    pub fn clear_origin(&mut self, to: InputSocketId) -> Result<(), GraphError> {
        let Some(origin) = self.get_input(to)?.origin else {
            return Ok(());
        };
        self.nodes[origin.node.slot()].outputs[origin.index]
            .targets
            .retain(|target| *target != to);
        self.nodes[to.node.slot()].inputs[to.index].origin = None;
        Ok(())
    }

    /// Sets the value an unlinked input is loaded with.
    pub fn set_default_value(&mut self, to: InputSocketId, value: Value) -> Result<(), GraphError> {
        let socket = self.get_input(to)?;
        if !socket.value_type.matches(&value) {
            return Err(GraphError::DefaultValueMismatch {
                socket: to,
                expected: socket.value_type,
            });
        }
        self.nodes[to.node.slot()].inputs[to.index].default_value = Some(value);
        Ok(())
    }

    /// Assigns every node a dense `index_in_graph`.
    ///
    /// Has to be called after all nodes were added and before the graph is
    /// used by an executor.
    pub fn update_node_indices(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.index_in_graph = i32::try_from(i).expect("node count exceeds i32 indices");
        }
    }

    /// Assigns every socket a dense `index_in_graph`, shared between inputs
    /// and outputs, and updates [`socket_num`](Self::socket_num).
    pub fn update_socket_indices(&mut self) {
        let mut next = 0_i32;
        for node in &mut self.nodes {
            for socket in &mut node.inputs {
                socket.index_in_graph = next;
                next += 1;
            }
            for socket in &mut node.outputs {
                socket.index_in_graph = next;
                next += 1;
            }
        }
        self.socket_num = next as usize;
    }

    // --- Queries ---

    /// Number of sockets counted by the last
    /// [`update_socket_indices`](Self::update_socket_indices).
    pub fn socket_num(&self) -> usize {
        self.socket_num
    }

    /// True if every node's `index_in_graph` matches its position.
    pub fn node_indices_are_valid(&self) -> bool {
        self.nodes
            .iter()
            .enumerate()
            .all(|(i, node)| usize::try_from(node.index_in_graph).is_ok_and(|index| index == i))
    }

    /// All nodes, interface nodes first.
    pub fn nodes(&self) -> &[Node<'f>] {
        &self.nodes
    }

    /// IDs of all function nodes.
    pub fn function_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|node| node.is_function())
            .map(|node| node.id)
    }

    /// All graph-input sockets, in creation order.
    pub fn graph_inputs(&self) -> Vec<GraphInputSocket> {
        (0..self.nodes[GRAPH_INPUT_NODE.slot()].outputs.len())
            .map(|index| OutputSocketId {
                node: GRAPH_INPUT_NODE,
                index,
            })
            .collect()
    }

    /// All graph-output sockets, in creation order.
    pub fn graph_outputs(&self) -> Vec<GraphOutputSocket> {
        (0..self.nodes[GRAPH_OUTPUT_NODE.slot()].inputs.len())
            .map(|index| InputSocketId {
                node: GRAPH_OUTPUT_NODE,
                index,
            })
            .collect()
    }

    /// Returns a node.
    pub fn get_node(&self, id: NodeId) -> Result<&Node<'f>, GraphError> {
        self.nodes.get(id.slot()).ok_or(GraphError::NodeNotFound(id))
    }

    /// Returns a node.
    ///
    /// # Panics
    ///
    /// Panics if the node does not exist.
    pub fn node(&self, id: NodeId) -> &Node<'f> {
        &self.nodes[id.slot()]
    }

    /// Returns an input socket.
    pub fn get_input(&self, id: InputSocketId) -> Result<&InputSocket, GraphError> {
        self.get_node(id.node)?
            .inputs
            .get(id.index)
            .ok_or_else(|| GraphError::SocketNotFound(id.to_string()))
    }

    /// Returns an output socket.
    pub fn get_output(&self, id: OutputSocketId) -> Result<&OutputSocket, GraphError> {
        self.get_node(id.node)?
            .outputs
            .get(id.index)
            .ok_or_else(|| GraphError::SocketNotFound(id.to_string()))
    }

    /// Returns an input socket.
    ///
    /// # Panics
    ///
    /// Panics if the socket does not exist.
    pub fn input(&self, id: InputSocketId) -> &InputSocket {
        &self.nodes[id.node.slot()].inputs[id.index]
    }

    /// Returns an output socket.
    ///
    /// # Panics
    ///
    /// Panics if the socket does not exist.
    pub fn output(&self, id: OutputSocketId) -> &OutputSocket {
        &self.nodes[id.node.slot()].outputs[id.index]
    }

    /// Handle of input `index` on `node`.
    pub fn input_id(&self, node: NodeId, index: usize) -> InputSocketId {
        InputSocketId { node, index }
    }

    /// Handle of output `index` on `node`.
    pub fn output_id(&self, node: NodeId, index: usize) -> OutputSocketId {
        OutputSocketId { node, index }
    }

    /// The function run by a function node.
    pub fn lazy_function(&self, id: NodeId) -> Result<&'f dyn LazyFunction, GraphError> {
        self.get_node(id)?
            .lazy_function()
            .ok_or(GraphError::NotAFunctionNode(id))
    }

    /// Name of an input socket.
    pub fn input_name(&self, id: InputSocketId) -> String {
        self.node(id.node).input_name(id.index)
    }

    /// Name of an output socket.
    pub fn output_name(&self, id: OutputSocketId) -> String {
        self.node(id.node).output_name(id.index)
    }

    /// Input socket name qualified with its node name.
    pub fn input_detailed_name(&self, id: InputSocketId) -> String {
        format!("{}:{}", self.node(id.node).name(), self.input_name(id))
    }

    /// Output socket name qualified with its node name.
    pub fn output_detailed_name(&self, id: OutputSocketId) -> String {
        format!("{}:{}", self.node(id.node).name(), self.output_name(id))
    }

    /// Number of links.
    pub fn link_count(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|node| node.outputs.iter())
            .map(|socket| socket.targets.len())
            .sum()
    }

    fn next_id(&self) -> NodeId {
        NodeId(u32::try_from(self.nodes.len()).expect("node count exceeds u32 ids"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{Input, Output};
    use crate::params::{Context, Params};
    use crate::value::value;

    struct Unary {
        inputs: Vec<Input>,
        outputs: Vec<Output>,
    }

    impl Unary {
        fn new() -> Self {
            Self {
                inputs: vec![Input::new("x", ValueType::of::<i32>())],
                outputs: vec![Output::new("y", ValueType::of::<i32>())],
            }
        }
    }

    impl LazyFunction for Unary {
        fn name(&self) -> String {
            "Unary".to_string()
        }
        fn inputs(&self) -> &[Input] {
            &self.inputs
        }
        fn outputs(&self) -> &[Output] {
            &self.outputs
        }
        fn execute_impl(&self, params: &Params<'_>, _context: &mut Context<'_>) {
            let x: i32 = params.get_input(0);
            params.set_output(0, x);
        }
    }

    #[test]
    fn test_new_graph_has_interface_nodes() {
        let graph = Graph::new();
        assert_eq!(graph.nodes().len(), 2);
        assert!(graph.node(GRAPH_INPUT_NODE).is_interface());
        assert!(graph.node(GRAPH_OUTPUT_NODE).is_interface());
        assert_eq!(graph.function_nodes().count(), 0);
    }

    #[test]
    fn test_link_sets_origin_and_targets() {
        let f = Unary::new();
        let mut graph = Graph::new();
        let input = graph.add_input(ValueType::of::<i32>(), "in");
        let node = graph.add_function(&f);
        graph.add_link(input, graph.input_id(node, 0)).unwrap();

        assert_eq!(graph.input(graph.input_id(node, 0)).origin(), Some(input));
        assert_eq!(graph.output(input).targets(), &[graph.input_id(node, 0)]);
    }

    #[test]
    fn test_second_link_into_input_is_rejected() {
        let f = Unary::new();
        let mut graph = Graph::new();
        let a = graph.add_input(ValueType::of::<i32>(), "a");
        let b = graph.add_input(ValueType::of::<i32>(), "b");
        let node = graph.add_function(&f);
        let target = graph.input_id(node, 0);
        graph.add_link(a, target).unwrap();

        assert_eq!(graph.add_link(b, target), Err(GraphError::InputAlreadyLinked(target)));
        assert_eq!(graph.input(target).origin(), Some(a));
        assert!(graph.output(b).targets().is_empty());
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let f = Unary::new();
        let mut graph = Graph::new();
        let a = graph.add_input(ValueType::of::<f32>(), "a");
        let node = graph.add_function(&f);
        let err = graph.add_link(a, graph.input_id(node, 0)).unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { .. }));
        assert!(graph.input(graph.input_id(node, 0)).origin().is_none());
    }

    #[test]
    fn test_clear_origin_removes_both_directions() {
        let f = Unary::new();
        let mut graph = Graph::new();
        let a = graph.add_input(ValueType::of::<i32>(), "a");
        let node = graph.add_function(&f);
        let target = graph.input_id(node, 0);
        graph.add_link(a, target).unwrap();
        graph.clear_origin(target).unwrap();
        assert!(graph.input(target).origin().is_none());
        assert!(graph.output(a).targets().is_empty());

        // Clearing an unlinked input is a no-op.
        graph.clear_origin(target).unwrap();
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_missing_socket_errors() {
        let mut graph = Graph::new();
        let a = graph.add_input(ValueType::of::<i32>(), "a");
        let bogus = InputSocketId {
            node: NodeId(7),
            index: 0,
        };
        assert_eq!(graph.add_link(a, bogus), Err(GraphError::NodeNotFound(NodeId(7))));
        let bogus_socket = InputSocketId {
            node: GRAPH_OUTPUT_NODE,
            index: 3,
        };
        assert!(matches!(graph.add_link(a, bogus_socket), Err(GraphError::SocketNotFound(_))));
    }

    #[test]
    fn test_default_value_type_is_checked() {
        let f = Unary::new();
        let mut graph = Graph::new();
        let node = graph.add_function(&f);
        let socket = graph.input_id(node, 0);
        assert!(graph.set_default_value(socket, value(1.5_f32)).is_err());
        graph.set_default_value(socket, value(4_i32)).unwrap();
        let default = graph.input(socket).default_value().unwrap();
        assert_eq!(default.downcast_ref::<i32>(), Some(&4));
    }

    #[test]
    fn test_indices_are_dense() {
        let f = Unary::new();
        let mut graph = Graph::new();
        graph.add_input(ValueType::of::<i32>(), "a");
        graph.add_function(&f);
        graph.add_output(ValueType::of::<i32>(), "out");
        assert!(!graph.node_indices_are_valid());
        graph.update_node_indices();
        graph.update_socket_indices();
        assert!(graph.node_indices_are_valid());
        assert_eq!(graph.socket_num(), 4);

        let mut seen: Vec<i32> = graph
            .nodes()
            .iter()
            .flat_map(|n| {
                n.inputs()
                    .iter()
                    .map(InputSocket::index_in_graph)
                    .chain(n.outputs().iter().map(OutputSocket::index_in_graph))
            })
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_node_index_matches_id() {
        let f = Unary::new();
        let mut graph = Graph::new();
        let nodes: Vec<NodeId> = (0..5).map(|_| graph.add_function(&f)).collect();
        graph.update_node_indices();
        for node in graph.nodes() {
            assert_eq!(i64::from(node.index_in_graph), i64::from(node.id.index()));
        }
        let mut sorted = nodes.clone();
        sorted.dedup();
        assert_eq!(sorted.len(), nodes.len(), "node ids must be unique");
    }

    #[test]
    fn test_names() {
        let f = Unary::new();
        let mut graph = Graph::new();
        let a = graph.add_input(ValueType::of::<i32>(), "a");
        let out = graph.add_output(ValueType::of::<i32>(), "result");
        let node = graph.add_function(&f);
        assert_eq!(graph.output_name(a), "a");
        assert_eq!(graph.input_name(out), "result");
        assert_eq!(graph.input_detailed_name(graph.input_id(node, 0)), "Unary:x");
        assert_eq!(graph.node(GRAPH_INPUT_NODE).name(), "Graph Inputs");
        assert_eq!(graph.node(GRAPH_OUTPUT_NODE).name(), "Graph Outputs");
        assert_eq!(graph.lazy_function(GRAPH_INPUT_NODE).err(), Some(GraphError::NotAFunctionNode(GRAPH_INPUT_NODE)));
    }

    #[test]
    fn test_cycles_are_allowed() {
        let f = Unary::new();
        let mut graph = Graph::new();
        let node = graph.add_function(&f);
        graph
            .add_link(graph.output_id(node, 0), graph.input_id(node, 0))
            .unwrap();
        assert_eq!(graph.link_count(), 1);
    }
}
