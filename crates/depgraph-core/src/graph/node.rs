//! Node and socket types of the lazy-function graph.
//!
//! Nodes are stored in an arena owned by [`Graph`](super::Graph) and addressed
//! with copyable handles. Sockets are addressed by their node plus their
//! position on that node, so no socket ever holds a pointer to another one.

use std::fmt;

use crate::function::LazyFunction;
use crate::value::{Value, ValueType};

/// Unique identifier for a node in a [`Graph`](super::Graph).
///
/// Node IDs are assigned sequentially and never reused within a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Addresses an input socket: the node plus the input's position on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputSocketId {
    /// Owning node.
    pub node: NodeId,
    /// Position among the node's inputs.
    pub index: usize,
}

/// Addresses an output socket: the node plus the output's position on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputSocketId {
    /// Owning node.
    pub node: NodeId,
    /// Position among the node's outputs.
    pub index: usize,
}

impl fmt::Display for InputSocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:in{}", self.node, self.index)
    }
}

impl fmt::Display for OutputSocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:out{}", self.node, self.index)
    }
}

/// A value provided by the caller of the graph. It lives on the graph-input
/// interface node, which only has outputs.
pub type GraphInputSocket = OutputSocketId;

/// A value returned to the caller of the graph. It lives on the graph-output
/// interface node, which only has inputs.
pub type GraphOutputSocket = InputSocketId;

/// The role of a node.
pub enum NodeKind<'f> {
    /// Runs a lazy function. The function is borrowed, not owned, and has to
    /// outlive the graph.
    Function(&'f dyn LazyFunction),
    /// Boundary node connecting the graph to its caller.
    Interface {
        /// Names of the node's sockets, in socket order.
        socket_names: Vec<String>,
    },
}

/// An input socket of a node.
pub struct InputSocket {
    pub(crate) value_type: ValueType,
    pub(crate) index: usize,
    pub(crate) index_in_graph: i32,
    pub(crate) origin: Option<OutputSocketId>,
    pub(crate) default_value: Option<Value>,
}

impl InputSocket {
    pub(crate) fn new(value_type: ValueType, index: usize) -> Self {
        Self {
            value_type,
            index,
            index_in_graph: -1,
            origin: None,
            default_value: None,
        }
    }

    /// Type of the socket.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Position on the owning node.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Dense graph-wide index, valid after
    /// [`Graph::update_socket_indices`](super::Graph::update_socket_indices).
    /// `-1` until then.
    pub fn index_in_graph(&self) -> i32 {
        self.index_in_graph
    }

    /// The output linked to this input, if any.
    pub fn origin(&self) -> Option<OutputSocketId> {
        self.origin
    }

    /// Value used when the input is not linked.
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }
}

/// An output socket of a node.
pub struct OutputSocket {
    pub(crate) value_type: ValueType,
    pub(crate) index: usize,
    pub(crate) index_in_graph: i32,
    pub(crate) targets: Vec<InputSocketId>,
}

impl OutputSocket {
    pub(crate) fn new(value_type: ValueType, index: usize) -> Self {
        Self {
            value_type,
            index,
            index_in_graph: -1,
            targets: Vec::new(),
        }
    }

    /// Type of the socket.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Position on the owning node.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Dense graph-wide index, or `-1` if not computed yet.
    pub fn index_in_graph(&self) -> i32 {
        self.index_in_graph
    }

    /// Inputs linked to this output, in link order.
    pub fn targets(&self) -> &[InputSocketId] {
        &self.targets
    }
}

/// A node: either a function node or one of the two interface nodes.
pub struct Node<'f> {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind<'f>,
    pub(crate) index_in_graph: i32,
    pub(crate) inputs: Vec<InputSocket>,
    pub(crate) outputs: Vec<OutputSocket>,
}

impl<'f> Node<'f> {
    pub(crate) fn function(id: NodeId, function: &'f dyn LazyFunction) -> Self {
        let inputs = function
            .inputs()
            .iter()
            .enumerate()
            .map(|(i, input)| InputSocket::new(input.value_type, i))
            .collect();
        let outputs = function
            .outputs()
            .iter()
            .enumerate()
            .map(|(i, output)| OutputSocket::new(output.value_type, i))
            .collect();
        Self {
            id,
            kind: NodeKind::Function(function),
            index_in_graph: -1,
            inputs,
            outputs,
        }
    }

    pub(crate) fn interface(id: NodeId) -> Self {
        Self {
            id,
            kind: NodeKind::Interface {
                socket_names: Vec::new(),
            },
            index_in_graph: -1,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Identifier of the node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Role of the node.
    pub fn kind(&self) -> &NodeKind<'f> {
        &self.kind
    }

    /// True for function nodes.
    pub fn is_function(&self) -> bool {
        matches!(self.kind, NodeKind::Function(_))
    }

    /// True for the graph-input and graph-output nodes.
    pub fn is_interface(&self) -> bool {
        matches!(self.kind, NodeKind::Interface { .. })
    }

    /// The function of a function node.
    pub fn lazy_function(&self) -> Option<&'f dyn LazyFunction> {
        match self.kind {
            NodeKind::Function(function) => Some(function),
            NodeKind::Interface { .. } => None,
        }
    }

    /// Dense graph-wide index, or `-1` if not computed yet.
    pub fn index_in_graph(&self) -> i32 {
        self.index_in_graph
    }

    /// Input sockets.
    pub fn inputs(&self) -> &[InputSocket] {
        &self.inputs
    }

    /// Output sockets.
    pub fn outputs(&self) -> &[OutputSocket] {
        &self.outputs
    }

    /// Input socket `index`.
    pub fn input(&self, index: usize) -> &InputSocket {
        &self.inputs[index]
    }

    /// Output socket `index`.
    pub fn output(&self, index: usize) -> &OutputSocket {
        &self.outputs[index]
    }

    /// Name of the node: the function name, or the interface role.
    pub fn name(&self) -> String {
        match self.kind {
            NodeKind::Function(function) => function.name(),
            NodeKind::Interface { .. } if self.id.0 == 0 => "Graph Inputs".to_string(),
            NodeKind::Interface { .. } => "Graph Outputs".to_string(),
        }
    }

    /// Name of input socket `index`.
    pub fn input_name(&self, index: usize) -> String {
        match &self.kind {
            NodeKind::Function(function) => function.input_name(index),
            NodeKind::Interface { socket_names } => socket_names[index].clone(),
        }
    }

    /// Name of output socket `index`.
    pub fn output_name(&self, index: usize) -> String {
        match &self.kind {
            NodeKind::Function(function) => function.output_name(index),
            NodeKind::Interface { socket_names } => socket_names[index].clone(),
        }
    }
}
