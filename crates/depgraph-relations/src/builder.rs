//! Key based relation building.
//!
//! [`RelationBuilder`] resolves keys to nodes, picks the exit operation of
//! the source and the entry operation of the destination, and connects them.
//! A relation whose endpoints do not resolve is skipped with an error log;
//! the build carries on so one missing relation does not lose the whole
//! graph.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut builder = RelationBuilder::new(&main, &mut graph);
//! let _entry = builder.trace_id(rig);
//! builder.add_relation(
//!     &ComponentKey::new(rig, NodeType::Transform),
//!     &OperationKey::new(rig, NodeType::EvalPose, OpCode::PoseInit),
//!     "Local Transform -> Pose Init",
//!     RelationFlags::NONE,
//! );
//! ```

use crate::depsgraph::{DepsGraph, NodeRef, OperationId, OperationNode, RelationFlags, RelationId};
use crate::id::{IdData, IdKey, IdType, Main, RigidBodyObject};
use crate::key::{ComponentKey, NodeKey, OperationKey, TimeSourceKey};
use crate::node_type::{NodeType, OpCode};
use crate::stack::{BuilderStack, ScopedEntry, StackEntry};

/// A destination resolved ahead of time, for callbacks that register their
/// own dependencies.
#[derive(Clone, Debug)]
pub struct NodeHandle {
    node: Option<NodeRef>,
    default_name: String,
}

impl NodeHandle {
    /// The resolved node, if the key named one.
    pub fn node(&self) -> Option<NodeRef> {
        self.node
    }

    /// Name used in diagnostics when the node is missing.
    pub fn default_name(&self) -> &str {
        &self.default_name
    }
}

/// Adds relations to a [`DepsGraph`] whose nodes were already built.
pub struct RelationBuilder<'a> {
    main: &'a Main,
    graph: &'a mut DepsGraph,
    stack: BuilderStack,
    failed_relations: usize,
}

impl<'a> RelationBuilder<'a> {
    /// Creates a builder writing into `graph`.
    pub fn new(main: &'a Main, graph: &'a mut DepsGraph) -> Self {
        Self {
            main,
            graph,
            stack: BuilderStack::new(),
            failed_relations: 0,
        }
    }

    /// The graph being built.
    pub fn graph(&self) -> &DepsGraph {
        self.graph
    }

    /// The database keys refer to.
    pub fn main(&self) -> &'a Main {
        self.main
    }

    /// Stack printed with failed relations.
    pub fn stack(&self) -> &BuilderStack {
        &self.stack
    }

    /// Traces work on data-block `id` until the guard is dropped.
    pub fn trace_id(&self, id: IdKey) -> ScopedEntry {
        self.stack.trace(StackEntry::Id(self.main.display_name(id)))
    }

    /// Number of relations skipped because an endpoint did not resolve.
    pub fn failed_relation_count(&self) -> usize {
        self.failed_relations
    }

    // --- Resolution ---

    /// Resolves any key to its node.
    pub fn get_node<K: NodeKey + ?Sized>(&self, key: &K) -> Option<NodeRef> {
        key.get_node(self.graph)
    }

    /// Resolves an operation key.
    pub fn find_operation_node(&self, key: &OperationKey) -> Option<OperationId> {
        match key.get_node(self.graph)? {
            NodeRef::Operation(op) => Some(op),
            _ => None,
        }
    }

    /// Resolves `key` now so relations can target it later through
    /// [`add_node_handle_relation`](Self::add_node_handle_relation).
    pub fn create_node_handle(&self, key: &OperationKey, default_name: &str) -> NodeHandle {
        NodeHandle {
            node: key.get_node(self.graph),
            default_name: default_name.to_string(),
        }
    }

    fn exit_of<K: NodeKey + ?Sized>(&self, key: &K) -> Option<OperationId> {
        key.get_node(self.graph).and_then(|node| self.graph.exit_operation(node))
    }

    fn entry_of<K: NodeKey + ?Sized>(&self, key: &K) -> Option<OperationId> {
        key.get_node(self.graph).and_then(|node| self.graph.entry_operation(node))
    }

    // --- Relations ---

    /// Connects the exit operation of `key_from` to the entry operation of
    /// `key_to`.
    ///
    /// A time source key connects the time source itself. Returns `None`
    /// and logs the unresolved endpoints when either side is missing.
    pub fn add_relation<F, T>(
        &mut self,
        key_from: &F,
        key_to: &T,
        description: &str,
        flags: RelationFlags,
    ) -> Option<RelationId>
    where
        F: NodeKey + ?Sized,
        T: NodeKey + ?Sized,
    {
        let node_from = key_from.get_node(self.graph);
        let op_to = self.entry_of(key_to);
        if node_from == Some(NodeRef::TimeSource) {
            return match op_to {
                Some(op_to) => Some(self.graph.add_time_relation(op_to, description, flags)),
                None => {
                    self.report_failure(description, None, Some(key_to.identifier(self.main)));
                    None
                }
            };
        }

        let op_from = node_from.and_then(|node| self.graph.exit_operation(node));
        match (op_from, op_to) {
            (Some(op_from), Some(op_to)) => {
                Some(self.graph.add_operation_relation(op_from, op_to, description, flags))
            }
            _ => {
                let missing_from = op_from.is_none().then(|| key_from.identifier(self.main));
                let missing_to = op_to.is_none().then(|| key_to.identifier(self.main));
                self.report_failure(description, missing_from, missing_to);
                None
            }
        }
    }

    /// Connects the time source to the entry operation of `key_to`.
    pub fn add_time_relation<T: NodeKey + ?Sized>(
        &mut self,
        key_from: &TimeSourceKey,
        key_to: &T,
        description: &str,
        flags: RelationFlags,
    ) -> Option<RelationId> {
        self.add_relation(key_from, key_to, description, flags)
    }

    /// Connects the exit operation of `key_from` to the entry operation of
    /// an already resolved handle.
    pub fn add_node_handle_relation<F: NodeKey + ?Sized>(
        &mut self,
        key_from: &F,
        handle: &NodeHandle,
        description: &str,
        flags: RelationFlags,
    ) -> Option<RelationId> {
        let op_from = self.exit_of(key_from);
        let op_to = handle.node.and_then(|node| self.graph.entry_operation(node));
        match (op_from, op_to) {
            (Some(op_from), Some(op_to)) => {
                Some(self.graph.add_operation_relation(op_from, op_to, description, flags))
            }
            _ => {
                let missing_from = op_from.is_none().then(|| key_from.identifier(self.main));
                let missing_to = op_to.is_none().then(|| handle.default_name.clone());
                self.report_failure(description, missing_from, missing_to);
                None
            }
        }
    }

    /// Makes `key_to` depend on the transform of data-block `id`.
    ///
    /// Rigid bodies whose collision shape is built from evaluated geometry
    /// depend on the `TRANSFORM_EVAL` operation specifically; everything else
    /// depends on the whole transform component.
    pub fn add_depends_on_transform_relation<T: NodeKey + ?Sized>(
        &mut self,
        id: IdKey,
        key_to: &T,
        description: &str,
        flags: RelationFlags,
    ) -> Option<RelationId> {
        let uses_evaluated_geometry = self
            .main
            .get(id)
            .and_then(IdData::rigidbody)
            .is_some_and(RigidBodyObject::depends_on_evaluated_geometry);
        if uses_evaluated_geometry {
            let transform_key = OperationKey::new(id, NodeType::Transform, OpCode::TransformEval);
            self.add_relation(&transform_key, key_to, description, flags)
        } else {
            let transform_key = ComponentKey::new(id, NodeType::Transform);
            self.add_relation(&transform_key, key_to, description, flags)
        }
    }

    /// Adds the relation from a driver variable's source to the driver.
    ///
    /// Skipped when the variable reads the final pose of the bone the driver
    /// writes to, or a node of the same node tree: those read an earlier
    /// state and do not form a real cycle.
    pub fn add_driver_variable_relation<V, D, T>(
        &mut self,
        variable_key: &V,
        driven_key: &D,
        driver_key: &T,
        description: &str,
    ) -> Option<RelationId>
    where
        V: NodeKey + ?Sized,
        D: NodeKey + ?Sized,
        T: NodeKey + ?Sized,
    {
        if self.is_same_bone_dependency(variable_key, driven_key)
            || self.is_same_nodetree_node_dependency(variable_key, driven_key)
        {
            tracing::debug!(description, "skipping self dependency of driver variable");
            return None;
        }
        self.add_relation(variable_key, driver_key, description, RelationFlags::NONE)
    }

    // --- Cycle suppression ---

    fn resolved_pair<F, T>(&self, key_from: &F, key_to: &T) -> Option<(&OperationNode, &OperationNode)>
    where
        F: NodeKey + ?Sized,
        T: NodeKey + ?Sized,
    {
        let op_from = self.exit_of(key_from)?;
        let op_to = self.entry_of(key_to)?;
        Some((self.graph.operation(op_from), self.graph.operation(op_to)))
    }

    /// True if the relation would lead from the `BONE_DONE` of a bone to the
    /// `BONE_LOCAL` of the same bone of the same armature.
    ///
    /// False whenever either key does not resolve.
    pub fn is_same_bone_dependency<F, T>(&self, key_from: &F, key_to: &T) -> bool
    where
        F: NodeKey + ?Sized,
        T: NodeKey + ?Sized,
    {
        let Some((op_from, op_to)) = self.resolved_pair(key_from, key_to) else {
            return false;
        };
        let component_from = self.graph.component(op_from.owner());
        let component_to = self.graph.component(op_to.owner());
        if component_from.owner() != component_to.owner() {
            return false;
        }
        if op_from.opcode() != OpCode::BoneDone || op_to.opcode() != OpCode::BoneLocal {
            return false;
        }
        component_from.name() == component_to.name()
    }

    /// True if the relation would connect two `PARAMETERS_EVAL` operations
    /// of the same node tree.
    ///
    /// False whenever either key does not resolve.
    pub fn is_same_nodetree_node_dependency<F, T>(&self, key_from: &F, key_to: &T) -> bool
    where
        F: NodeKey + ?Sized,
        T: NodeKey + ?Sized,
    {
        let Some((op_from, op_to)) = self.resolved_pair(key_from, key_to) else {
            return false;
        };
        let owner_from = self.graph.component(op_from.owner()).owner();
        let owner_to = self.graph.component(op_to.owner()).owner();
        if self.graph.id_node(owner_from).id_type() != IdType::NodeTree {
            return false;
        }
        if owner_from != owner_to {
            return false;
        }
        op_from.opcode() == OpCode::ParametersEval && op_to.opcode() == OpCode::ParametersEval
    }

    // --- Diagnostics ---

    fn report_failure(&mut self, description: &str, missing_from: Option<String>, missing_to: Option<String>) {
        self.failed_relations += 1;
        let mut message = format!("Failed to add relation \"{description}\"");
        if let Some(from) = missing_from {
            message.push_str(&format!("\nCould not find op_from: {from}"));
        }
        if let Some(to) = missing_to {
            message.push_str(&format!("\nCould not find op_to: {to}"));
        }
        if !self.stack.is_empty() {
            message.push_str("\nTrace:\n");
            message.push_str(&self.stack.backtrace());
        }
        tracing::error!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{IdKind, ObjectData, ObjectType, RigidBodyMeshSource, RigidBodyShape};

    fn transform_graph(main: &Main, id: IdKey, graph: &mut DepsGraph) {
        let node = graph.add_id_node(main, id).unwrap();
        let transform = graph.add_component_node(node, NodeType::Transform, "");
        let local = graph.add_operation_node(transform, OpCode::TransformLocal, "", -1);
        let eval = graph.add_operation_node(transform, OpCode::TransformEval, "", -1);
        let final_op = graph.add_operation_node(transform, OpCode::TransformFinal, "", -1);
        graph.mark_entry(local);
        graph.mark_exit(final_op);
        graph.add_operation_relation(local, eval, "Local -> Eval", RelationFlags::NONE);
        graph.add_operation_relation(eval, final_op, "Eval -> Final", RelationFlags::NONE);
        let geometry = graph.add_component_node(node, NodeType::Geometry, "");
        graph.add_operation_node(geometry, OpCode::GeometryEval, "", -1);
    }

    #[test]
    fn test_relation_connects_exit_to_entry() {
        let mut main = Main::new();
        let cube = main.add_object("Cube");
        let mut graph = DepsGraph::new();
        transform_graph(&main, cube, &mut graph);

        let mut builder = RelationBuilder::new(&main, &mut graph);
        let id = builder
            .add_relation(
                &ComponentKey::new(cube, NodeType::Transform),
                &ComponentKey::new(cube, NodeType::Geometry),
                "Transform -> Geometry",
                RelationFlags::NONE,
            )
            .unwrap();
        let relation = builder.graph().relation(id);
        let from = OperationKey::new(cube, NodeType::Transform, OpCode::TransformFinal);
        let to = OperationKey::new(cube, NodeType::Geometry, OpCode::GeometryEval);
        assert_eq!(relation.from, crate::RelationSource::Operation(builder.find_operation_node(&from).unwrap()));
        assert_eq!(Some(relation.to), builder.find_operation_node(&to));
    }

    #[test]
    fn test_time_source_relation() {
        let mut main = Main::new();
        let cube = main.add_object("Cube");
        let mut graph = DepsGraph::new();
        transform_graph(&main, cube, &mut graph);

        let mut builder = RelationBuilder::new(&main, &mut graph);
        let key = ComponentKey::new(cube, NodeType::Transform);
        assert!(builder.add_time_relation(&TimeSourceKey, &key, "Time", RelationFlags::NONE).is_some());
        assert!(builder.add_relation(&TimeSourceKey, &key, "Time again", RelationFlags::NONE).is_some());
        assert_eq!(builder.graph().time_source().outlinks().len(), 2);

        let missing = ComponentKey::new(cube, NodeType::Shading);
        assert!(builder.add_time_relation(&TimeSourceKey, &missing, "Time", RelationFlags::NONE).is_none());
        assert_eq!(builder.failed_relation_count(), 1);
    }

    #[test]
    fn test_id_node_cannot_be_an_endpoint() {
        struct WholeId(IdKey);
        impl NodeKey for WholeId {
            fn get_node(&self, graph: &DepsGraph) -> Option<NodeRef> {
                graph.find_id_node(self.0).map(NodeRef::Id)
            }
            fn identifier(&self, main: &Main) -> String {
                format!("IDKey({})", main.display_name(self.0))
            }
        }

        let mut main = Main::new();
        let cube = main.add_object("Cube");
        let mut graph = DepsGraph::new();
        transform_graph(&main, cube, &mut graph);
        let mut builder = RelationBuilder::new(&main, &mut graph);
        let to = ComponentKey::new(cube, NodeType::Geometry);
        assert!(builder.add_relation(&WholeId(cube), &to, "ID", RelationFlags::NONE).is_none());
        assert_eq!(builder.graph().relation_count(), 2);
    }

    #[test]
    fn test_node_handle_relation() {
        let mut main = Main::new();
        let cube = main.add_object("Cube");
        let mut graph = DepsGraph::new();
        transform_graph(&main, cube, &mut graph);

        let mut builder = RelationBuilder::new(&main, &mut graph);
        let target = OperationKey::new(cube, NodeType::Geometry, OpCode::GeometryEval);
        let handle = builder.create_node_handle(&target, "Geometry Eval");
        assert!(handle.node().is_some());
        let transform = ComponentKey::new(cube, NodeType::Transform);
        assert!(builder.add_node_handle_relation(&transform, &handle, "Handle", RelationFlags::NONE).is_some());

        let missing = builder.create_node_handle(
            &OperationKey::new(cube, NodeType::Shading, OpCode::Shading),
            "Shading",
        );
        assert_eq!(missing.default_name(), "Shading");
        assert!(builder.add_node_handle_relation(&transform, &missing, "Handle", RelationFlags::NONE).is_none());
        assert_eq!(builder.failed_relation_count(), 1);
    }

    #[test]
    fn test_depends_on_transform_follows_rigid_body_shape() {
        let mut main = Main::new();
        let plain = main.add_object("Plain");
        let hull_base = main.add(
            "HullBase",
            IdKind::Object(ObjectData {
                object_type: ObjectType::Mesh,
                rigidbody: Some(RigidBodyObject {
                    shape: RigidBodyShape::ConvexHull,
                    mesh_source: RigidBodyMeshSource::Base,
                }),
            }),
        );
        let trimesh_final = main.add(
            "MeshFinal",
            IdKind::Object(ObjectData {
                object_type: ObjectType::Mesh,
                rigidbody: Some(RigidBodyObject {
                    shape: RigidBodyShape::TriangleMesh,
                    mesh_source: RigidBodyMeshSource::Final,
                }),
            }),
        );
        let mut graph = DepsGraph::new();
        for id in [plain, hull_base, trimesh_final] {
            transform_graph(&main, id, &mut graph);
        }

        let mut builder = RelationBuilder::new(&main, &mut graph);
        for (id, expected_opcode) in [
            (plain, OpCode::TransformFinal),
            (hull_base, OpCode::TransformFinal),
            (trimesh_final, OpCode::TransformEval),
        ] {
            let to = ComponentKey::new(id, NodeType::Geometry);
            let relation = builder
                .add_depends_on_transform_relation(id, &to, "Transform", RelationFlags::NONE)
                .unwrap();
            let crate::RelationSource::Operation(from) = builder.graph().relation(relation).from else {
                panic!("expected an operation source");
            };
            assert_eq!(builder.graph().operation(from).opcode(), expected_opcode);
        }
    }

    #[test]
    fn test_failure_keeps_stack_balanced() {
        let mut main = Main::new();
        let cube = main.add_object("Cube");
        let mut graph = DepsGraph::new();
        transform_graph(&main, cube, &mut graph);
        let mut builder = RelationBuilder::new(&main, &mut graph);
        {
            let _id = builder.trace_id(cube);
            let _other = builder.stack().trace(StackEntry::Constraint("Copy Location".into()));
            let missing = ComponentKey::new(cube, NodeType::Animation);
            assert!(
                builder
                    .add_relation(&missing, &ComponentKey::new(cube, NodeType::Geometry), "Anim", RelationFlags::NONE)
                    .is_none()
            );
            assert_eq!(builder.stack().depth(), 2);
        }
        assert!(builder.stack().is_empty());
    }
}
