//! Operation dependency graph.
//!
//! A [`DepsGraph`] holds a three level hierarchy of nodes (ID → component →
//! operation) plus a single time source, and the relations between
//! operations. Nodes are never removed, so all handles stay valid for the
//! lifetime of the graph.
//!
//! # Architecture
//!
//! ```text
//! TimeSource ──────────────┐
//!                          ▼
//! ID "OBRig"           ┌────────────┐     ┌──────────────────┐
//!   ├─ TRANSFORM ─────▶│ POSE_INIT  │────▶│ BONE_LOCAL (Arm) │──▶ ...
//!   └─ EVAL_POSE       └────────────┘     └──────────────────┘
//! ```
//!
//! Relations between components or IDs are resolved to their entry and exit
//! operations by [`RelationBuilder`](crate::RelationBuilder).

mod dot;
mod nodes;
mod relation;

use std::collections::HashMap;

use crate::error::RelationError;
use crate::id::{IdKey, Main};
use crate::node_type::{NodeType, OpCode};

pub use nodes::{ComponentId, ComponentNode, IdNode, IdNodeId, NodeRef, OperationId, OperationNode, TimeSourceNode};
pub use relation::{Relation, RelationFlags, RelationId, RelationSource};

/// The operation graph under construction.
#[derive(Debug, Default)]
pub struct DepsGraph {
    time_source: TimeSourceNode,
    id_nodes: Vec<IdNode>,
    id_lookup: HashMap<IdKey, IdNodeId>,
    components: Vec<ComponentNode>,
    operations: Vec<OperationNode>,
    relations: Vec<Relation>,
}

impl DepsGraph {
    /// Creates an empty graph with its time source.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Node building ---

    /// Adds the node of data-block `id`, or returns the existing one.
    pub fn add_id_node(&mut self, main: &Main, id: IdKey) -> Result<IdNodeId, RelationError> {
        if let Some(&existing) = self.id_lookup.get(&id) {
            return Ok(existing);
        }
        let data = main.get(id).ok_or(RelationError::UnknownId(id))?;
        let node_id = IdNodeId(self.id_nodes.len() as u32);
        self.id_nodes.push(IdNode {
            id,
            name: data.full_name(),
            id_type: data.kind.id_type(),
            components: Vec::new(),
        });
        self.id_lookup.insert(id, node_id);
        tracing::trace!(id = %data.full_name(), "added ID node");
        Ok(node_id)
    }

    /// Adds a component to an ID node, or returns the existing one with the
    /// same type and name.
    pub fn add_component_node(&mut self, owner: IdNodeId, node_type: NodeType, name: &str) -> ComponentId {
        if let Some(existing) = self.find_component_in(owner, node_type, name) {
            return existing;
        }
        let component = ComponentId(self.components.len() as u32);
        self.components.push(ComponentNode {
            owner,
            node_type,
            name: name.to_string(),
            operations: Vec::new(),
            entry: None,
            exit: None,
        });
        self.id_nodes[owner.index()].components.push(component);
        component
    }

    /// Adds an operation to a component, or returns the existing one with
    /// the same opcode, name and tag.
    pub fn add_operation_node(&mut self, owner: ComponentId, opcode: OpCode, name: &str, name_tag: i32) -> OperationId {
        if let Some(existing) = self.find_operation_in(owner, opcode, name, name_tag) {
            tracing::debug!(
                operation = %self.operation_identifier(existing),
                "operation already exists, reusing it"
            );
            return existing;
        }
        let operation = OperationId(self.operations.len() as u32);
        self.operations.push(OperationNode {
            owner,
            opcode,
            name: name.to_string(),
            name_tag,
            inlinks: Vec::new(),
            outlinks: Vec::new(),
        });
        self.components[owner.index()].operations.push(operation);
        operation
    }

    /// Makes `operation` the entry point of its component.
    pub fn mark_entry(&mut self, operation: OperationId) {
        let owner = self.operations[operation.index()].owner;
        self.components[owner.index()].entry = Some(operation);
    }

    /// Makes `operation` the exit point of its component.
    pub fn mark_exit(&mut self, operation: OperationId) {
        let owner = self.operations[operation.index()].owner;
        self.components[owner.index()].exit = Some(operation);
    }

    // --- Lookup ---

    /// Node of data-block `id`, if it was added.
    pub fn find_id_node(&self, id: IdKey) -> Option<IdNodeId> {
        self.id_lookup.get(&id).copied()
    }

    /// Component `(node_type, name)` of data-block `id`.
    pub fn find_component(&self, id: IdKey, node_type: NodeType, name: &str) -> Option<ComponentId> {
        self.find_component_in(self.find_id_node(id)?, node_type, name)
    }

    fn find_component_in(&self, owner: IdNodeId, node_type: NodeType, name: &str) -> Option<ComponentId> {
        self.id_nodes[owner.index()]
            .components
            .iter()
            .copied()
            .find(|c| {
                let component = &self.components[c.index()];
                component.node_type == node_type && component.name == name
            })
    }

    /// Operation `(opcode, name, name_tag)` of a component.
    pub fn find_operation_in(
        &self,
        owner: ComponentId,
        opcode: OpCode,
        name: &str,
        name_tag: i32,
    ) -> Option<OperationId> {
        self.components[owner.index()]
            .operations
            .iter()
            .copied()
            .find(|o| {
                let operation = &self.operations[o.index()];
                operation.opcode == opcode && operation.name == name && operation.name_tag == name_tag
            })
    }

    /// Operation relations into `node` connect to.
    ///
    /// An operation is its own entry. ID nodes and the time source have no
    /// entry operation.
    pub fn entry_operation(&self, node: NodeRef) -> Option<OperationId> {
        match node {
            NodeRef::Operation(op) => Some(op),
            NodeRef::Component(c) => self.components[c.index()].entry_operation(),
            NodeRef::Id(_) | NodeRef::TimeSource => None,
        }
    }

    /// Operation relations out of `node` start from.
    pub fn exit_operation(&self, node: NodeRef) -> Option<OperationId> {
        match node {
            NodeRef::Operation(op) => Some(op),
            NodeRef::Component(c) => self.components[c.index()].exit_operation(),
            NodeRef::Id(_) | NodeRef::TimeSource => None,
        }
    }

    // --- Relations ---

    /// Adds a relation between two operations.
    ///
    /// With [`RelationFlags::CHECK_BEFORE_ADD`] an existing relation with the
    /// same endpoints and description is returned instead, with the new
    /// flags merged in.
    pub fn add_operation_relation(
        &mut self,
        from: OperationId,
        to: OperationId,
        description: &str,
        flags: RelationFlags,
    ) -> RelationId {
        self.add_relation_internal(RelationSource::Operation(from), to, description, flags)
    }

    /// Adds a relation from the time source to `to`.
    pub fn add_time_relation(&mut self, to: OperationId, description: &str, flags: RelationFlags) -> RelationId {
        self.add_relation_internal(RelationSource::TimeSource, to, description, flags)
    }

    fn add_relation_internal(
        &mut self,
        from: RelationSource,
        to: OperationId,
        description: &str,
        mut flags: RelationFlags,
    ) -> RelationId {
        let check_before_add = flags.contains(RelationFlags::CHECK_BEFORE_ADD);
        flags.remove(RelationFlags::CHECK_BEFORE_ADD);
        if check_before_add && let Some(existing) = self.find_relation(from, to, description) {
            self.relations[existing.index()].flags |= flags;
            return existing;
        }

        let id = RelationId(self.relations.len() as u32);
        self.relations.push(Relation {
            from,
            to,
            description: description.to_string(),
            flags,
        });
        match from {
            RelationSource::TimeSource => self.time_source.outlinks.push(id),
            RelationSource::Operation(op) => self.operations[op.index()].outlinks.push(id),
        }
        self.operations[to.index()].inlinks.push(id);
        tracing::trace!(
            from = %self.source_identifier(from),
            to = %self.operation_identifier(to),
            description,
            "added relation"
        );
        id
    }

    /// Relation with exactly these endpoints and description.
    pub fn find_relation(&self, from: RelationSource, to: OperationId, description: &str) -> Option<RelationId> {
        self.operations[to.index()]
            .inlinks
            .iter()
            .copied()
            .find(|r| {
                let relation = &self.relations[r.index()];
                relation.from == from && relation.description == description
            })
    }

    /// True if some relation leads from `from` to `to`, whatever its
    /// description.
    pub fn has_relation(&self, from: OperationId, to: OperationId) -> bool {
        self.operations[from.index()]
            .outlinks
            .iter()
            .any(|r| self.relations[r.index()].to == to)
    }

    pub(crate) fn relation_mut(&mut self, id: RelationId) -> &mut Relation {
        &mut self.relations[id.index()]
    }

    // --- Accessors ---

    /// The time source.
    pub fn time_source(&self) -> &TimeSourceNode {
        &self.time_source
    }

    /// An ID node. Panics on a handle from another graph.
    pub fn id_node(&self, id: IdNodeId) -> &IdNode {
        &self.id_nodes[id.index()]
    }

    /// A component. Panics on a handle from another graph.
    pub fn component(&self, id: ComponentId) -> &ComponentNode {
        &self.components[id.index()]
    }

    /// An operation. Panics on a handle from another graph.
    pub fn operation(&self, id: OperationId) -> &OperationNode {
        &self.operations[id.index()]
    }

    /// A relation. Panics on a handle from another graph.
    pub fn relation(&self, id: RelationId) -> &Relation {
        &self.relations[id.index()]
    }

    /// All ID nodes in creation order.
    pub fn id_nodes(&self) -> impl Iterator<Item = (IdNodeId, &IdNode)> {
        self.id_nodes.iter().enumerate().map(|(i, n)| (IdNodeId(i as u32), n))
    }

    /// All operations in creation order.
    pub fn operations(&self) -> impl Iterator<Item = (OperationId, &OperationNode)> {
        self.operations.iter().enumerate().map(|(i, n)| (OperationId(i as u32), n))
    }

    /// All relations in creation order.
    pub fn relations(&self) -> impl Iterator<Item = (RelationId, &Relation)> {
        self.relations.iter().enumerate().map(|(i, r)| (RelationId(i as u32), r))
    }

    /// Number of ID nodes.
    pub fn id_node_count(&self) -> usize {
        self.id_nodes.len()
    }

    /// Number of components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of operations.
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Number of relations.
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    // --- Identifiers ---

    /// Full identifier of a component, e.g. `OBRig/BONE(Arm)`.
    pub fn component_identifier(&self, id: ComponentId) -> String {
        let component = &self.components[id.index()];
        let owner = &self.id_nodes[component.owner.index()];
        if component.name.is_empty() {
            format!("{}/{}", owner.name, component.node_type)
        } else {
            format!("{}/{}({})", owner.name, component.node_type, component.name)
        }
    }

    /// Full identifier of an operation, e.g. `OBRig/BONE(Arm)/BONE_DONE`.
    pub fn operation_identifier(&self, id: OperationId) -> String {
        let operation = &self.operations[id.index()];
        format!("{}/{}", self.component_identifier(operation.owner), operation.identifier())
    }

    /// Identifier of a relation source.
    pub fn source_identifier(&self, source: RelationSource) -> String {
        match source {
            RelationSource::TimeSource => "TimeSource".to_string(),
            RelationSource::Operation(op) => self.operation_identifier(op),
        }
    }
}
