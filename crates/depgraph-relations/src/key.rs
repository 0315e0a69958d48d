//! Keys naming nodes of a [`DepsGraph`] before they are looked up.
//!
//! Relation building code constructs keys from what it knows about the
//! scene (a data-block, a component type, a bone name) and lets the
//! [`RelationBuilder`](crate::RelationBuilder) resolve them. A key that
//! resolves to nothing is not an error by itself.

use crate::depsgraph::{DepsGraph, NodeRef};
use crate::id::{IdKey, Main};
use crate::node_type::{NodeType, OpCode};

/// Resolves to a node of a [`DepsGraph`].
pub trait NodeKey {
    /// The node this key names, if the graph has it.
    fn get_node(&self, graph: &DepsGraph) -> Option<NodeRef>;

    /// Text identifying the key in diagnostics.
    fn identifier(&self, main: &Main) -> String;
}

/// Names the graph's time source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeSourceKey;

impl NodeKey for TimeSourceKey {
    fn get_node(&self, _graph: &DepsGraph) -> Option<NodeRef> {
        Some(NodeRef::TimeSource)
    }

    fn identifier(&self, _main: &Main) -> String {
        "TimeSourceKey".to_string()
    }
}

/// Names a component of a data-block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentKey {
    /// Owning data-block.
    pub id: IdKey,
    /// Component kind.
    pub node_type: NodeType,
    /// Bone name for bone components, empty otherwise.
    pub name: String,
}

impl ComponentKey {
    /// Unnamed component of `id`.
    pub fn new(id: IdKey, node_type: NodeType) -> Self {
        Self {
            id,
            node_type,
            name: String::new(),
        }
    }

    /// Named component of `id`, e.g. a bone.
    pub fn named(id: IdKey, node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            id,
            node_type,
            name: name.into(),
        }
    }
}

impl NodeKey for ComponentKey {
    fn get_node(&self, graph: &DepsGraph) -> Option<NodeRef> {
        graph
            .find_component(self.id, self.node_type, &self.name)
            .map(NodeRef::Component)
    }

    fn identifier(&self, main: &Main) -> String {
        let mut result = format!("ComponentKey({}, {}", main.display_name(self.id), self.node_type);
        if !self.name.is_empty() {
            result.push_str(&format!(", '{}'", self.name));
        }
        result.push(')');
        result
    }
}

/// Names one operation of a component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationKey {
    /// Owning data-block.
    pub id: IdKey,
    /// Kind of the owning component.
    pub component_type: NodeType,
    /// Name of the owning component.
    pub component_name: String,
    /// What the operation computes.
    pub opcode: OpCode,
    /// Operation name, empty for most operations.
    pub name: String,
    /// `-1` when unused.
    pub name_tag: i32,
}

impl OperationKey {
    /// Operation of an unnamed component.
    pub fn new(id: IdKey, component_type: NodeType, opcode: OpCode) -> Self {
        Self {
            id,
            component_type,
            component_name: String::new(),
            opcode,
            name: String::new(),
            name_tag: -1,
        }
    }

    /// Operation of a named component, e.g. `BONE_DONE` of one bone.
    pub fn in_component(
        id: IdKey,
        component_type: NodeType,
        component_name: impl Into<String>,
        opcode: OpCode,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            ..Self::new(id, component_type, opcode)
        }
    }

    /// Sets the operation name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the operation name tag.
    pub fn with_tag(mut self, name_tag: i32) -> Self {
        self.name_tag = name_tag;
        self
    }

    /// The component this operation belongs to.
    pub fn component(&self) -> ComponentKey {
        ComponentKey::named(self.id, self.component_type, self.component_name.clone())
    }
}

impl NodeKey for OperationKey {
    fn get_node(&self, graph: &DepsGraph) -> Option<NodeRef> {
        let component = graph.find_component(self.id, self.component_type, &self.component_name)?;
        graph
            .find_operation_in(component, self.opcode, &self.name, self.name_tag)
            .map(NodeRef::Operation)
    }

    fn identifier(&self, main: &Main) -> String {
        let mut result = format!(
            "OperationKey(type: {}, component name: '{}', operation code: {}",
            self.component_type, self.component_name, self.opcode
        );
        if !self.name.is_empty() {
            result.push_str(&format!(", '{}'", self.name));
        }
        result.push_str(&format!(", id: {})", main.display_name(self.id)));
        result
    }
}
