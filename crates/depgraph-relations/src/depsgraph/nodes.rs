//! Node types of the operation graph.
//!
//! Nodes are stored in arenas owned by [`DepsGraph`](super::DepsGraph) and
//! refer to each other by index. The hierarchy is fixed: an ID node owns
//! components, a component owns operations. Relations only ever connect
//! operations, or the time source to an operation.

use std::fmt;

use crate::id::{IdKey, IdType};
use crate::node_type::{NodeType, OpCode};

use super::relation::RelationId;

/// Index of an [`IdNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdNodeId(pub(crate) u32);

/// Index of a [`ComponentNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

/// Index of an [`OperationNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub(crate) u32);

impl IdNodeId {
    /// Returns the raw index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ComponentId {
    /// Returns the raw index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl OperationId {
    /// Returns the raw index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Any node a key can resolve to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// The graph's time source.
    TimeSource,
    /// A whole data-block.
    Id(IdNodeId),
    /// A component of a data-block.
    Component(ComponentId),
    /// A single operation.
    Operation(OperationId),
}

/// Source of frame changes. Only has outgoing relations.
#[derive(Debug, Default)]
pub struct TimeSourceNode {
    pub(crate) outlinks: Vec<RelationId>,
}

impl TimeSourceNode {
    /// Relations starting at the time source.
    pub fn outlinks(&self) -> &[RelationId] {
        &self.outlinks
    }
}

/// A data-block in the graph.
#[derive(Debug)]
pub struct IdNode {
    pub(crate) id: IdKey,
    pub(crate) name: String,
    pub(crate) id_type: IdType,
    pub(crate) components: Vec<ComponentId>,
}

impl IdNode {
    /// The data-block this node stands for.
    pub fn id(&self) -> IdKey {
        self.id
    }

    /// Display name, including the kind code.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of the data-block.
    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    /// Components in creation order.
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }
}

/// A group of operations of one data-block, e.g. its transform or one bone.
#[derive(Debug)]
pub struct ComponentNode {
    pub(crate) owner: IdNodeId,
    pub(crate) node_type: NodeType,
    pub(crate) name: String,
    pub(crate) operations: Vec<OperationId>,
    pub(crate) entry: Option<OperationId>,
    pub(crate) exit: Option<OperationId>,
}

impl ComponentNode {
    /// The ID node owning this component.
    pub fn owner(&self) -> IdNodeId {
        self.owner
    }

    /// Component kind.
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Component name; the bone name for bone components, empty otherwise.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operations in creation order.
    pub fn operations(&self) -> &[OperationId] {
        &self.operations
    }

    /// Operation relations into this component connect to.
    ///
    /// The explicitly marked entry, or the only operation of the component.
    pub fn entry_operation(&self) -> Option<OperationId> {
        self.entry.or_else(|| self.single_operation())
    }

    /// Operation relations out of this component start from.
    pub fn exit_operation(&self) -> Option<OperationId> {
        self.exit.or_else(|| self.single_operation())
    }

    fn single_operation(&self) -> Option<OperationId> {
        match self.operations.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}

/// One unit of evaluation.
#[derive(Debug)]
pub struct OperationNode {
    pub(crate) owner: ComponentId,
    pub(crate) opcode: OpCode,
    pub(crate) name: String,
    pub(crate) name_tag: i32,
    pub(crate) inlinks: Vec<RelationId>,
    pub(crate) outlinks: Vec<RelationId>,
}

impl OperationNode {
    /// The component owning this operation.
    pub fn owner(&self) -> ComponentId {
        self.owner
    }

    /// What the operation computes.
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Optional name distinguishing operations with the same opcode.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional tag distinguishing operations with the same opcode and name.
    /// `-1` when unused.
    pub fn name_tag(&self) -> i32 {
        self.name_tag
    }

    /// Relations ending at this operation.
    pub fn inlinks(&self) -> &[RelationId] {
        &self.inlinks
    }

    /// Relations starting at this operation.
    pub fn outlinks(&self) -> &[RelationId] {
        &self.outlinks
    }

    /// Short identifier, e.g. `BONE_DONE` or `PARAMETERS_EVAL(Socket)`.
    pub fn identifier(&self) -> String {
        let mut result = self.opcode.as_str().to_string();
        if !self.name.is_empty() {
            result.push('(');
            result.push_str(&self.name);
            result.push(')');
        }
        if self.name_tag != -1 {
            result.push_str(&format!("[{}]", self.name_tag));
        }
        result
    }
}
