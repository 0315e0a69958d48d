//! Nodes and relations of an armature rig.
//!
//! A [`Rig`] describes a posed object: its bones, their constraints and
//! B-Bone segments, and drivers that copy values between bones.
//! [`build_rig_nodes`] creates the operations, [`build_rig_relations`]
//! connects them through a [`RelationBuilder`]. IK and spline IK chains are
//! built first (see [`ik`]) so that parenting inside a chain can tell them
//! apart from plain parenting.

pub mod ik;

use crate::builder::RelationBuilder;
use crate::depsgraph::{DepsGraph, IdNodeId, RelationFlags};
use crate::error::RelationError;
use crate::id::{IdKey, Main, ObjectType};
use crate::key::{ComponentKey, OperationKey};
use crate::node_type::{NodeType, OpCode};
use crate::stack::StackEntry;

use ik::{ChainRoots, build_ik_pose, build_splineik_pose, ik_chain_root, spline_ik_chain_root};

/// An object, and optionally a bone or vertex group of it, read by a
/// constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstraintTarget {
    /// Target object.
    pub object: IdKey,
    /// Bone of an armature target, or vertex group of a mesh or lattice.
    pub subtarget: Option<String>,
}

impl ConstraintTarget {
    /// Targets a whole object.
    pub fn object(object: IdKey) -> Self {
        Self {
            object,
            subtarget: None,
        }
    }

    /// Targets a bone or vertex group of `object`.
    pub fn sub(object: IdKey, subtarget: impl Into<String>) -> Self {
        Self {
            object,
            subtarget: Some(subtarget.into()),
        }
    }
}

/// Solver used for the IK chains of a pose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IkSolver {
    /// The standard solver.
    #[default]
    Standard,
    /// iTaSC, which reads targets while building its tree.
    Itasc,
}

/// Inverse kinematics settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IkConstraint {
    /// What the chain tip reaches for.
    pub target: Option<ConstraintTarget>,
    /// What the chain bends towards.
    pub pole_target: Option<ConstraintTarget>,
    /// Bones in the chain, `0` for every bone up to the top of the hierarchy.
    pub chain_length: usize,
    /// Whether the owner bone is the tip of the chain.
    pub use_tip: bool,
    /// Whether any of the constraint properties are animated.
    pub animated: bool,
}

impl Default for IkConstraint {
    fn default() -> Self {
        Self {
            target: None,
            pole_target: None,
            chain_length: 0,
            use_tip: true,
            animated: false,
        }
    }
}

/// Spline IK settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplineIkConstraint {
    /// Curve object the chain follows.
    pub target: Option<IdKey>,
    /// Bones in the chain, counting the owner.
    pub chain_length: usize,
}

/// What a constraint does, as far as relations are concerned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Solved by a pose-level IK solver.
    Ik(IkConstraint),
    /// Solved by a pose-level spline IK solver.
    SplineIk(SplineIkConstraint),
    /// Copies location, rotation, scale or whole transforms of a target in
    /// world space.
    CopyTransforms(Option<ConstraintTarget>),
    /// Only reads the bone's own transform, e.g. a limit.
    Local,
}

impl ConstraintKind {
    /// True if the constraint needs the world matrix of the object.
    pub fn needs_object_transform(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

/// One constraint of a bone's stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    /// Name, used as relation description for target links.
    pub name: String,
    /// Kind and settings.
    pub kind: ConstraintKind,
    /// Muted constraints are skipped by the IK builders.
    pub disabled: bool,
}

impl Constraint {
    /// An enabled constraint.
    pub fn new(name: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            name: name.into(),
            kind,
            disabled: false,
        }
    }

    /// A constraint that only works on the local transform.
    pub fn local(name: impl Into<String>) -> Self {
        Self::new(name, ConstraintKind::Local)
    }

    /// Objects this constraint reads, other than the owner.
    fn target_objects(&self) -> Vec<IdKey> {
        match &self.kind {
            ConstraintKind::Ik(ik) => ik.target.iter().chain(&ik.pole_target).map(|t| t.object).collect(),
            ConstraintKind::SplineIk(spline) => spline.target.into_iter().collect(),
            ConstraintKind::CopyTransforms(target) => target.iter().map(|t| t.object).collect(),
            ConstraintKind::Local => Vec::new(),
        }
    }
}

/// One bone of the pose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bone {
    /// Unique within the rig.
    pub name: String,
    /// Name of the parent bone.
    pub parent: Option<String>,
    /// Constraint stack, evaluated in order.
    pub constraints: Vec<Constraint>,
    /// Whether the bone is a B-Bone with curved segments.
    pub has_segments: bool,
}

impl Bone {
    /// A root bone without constraints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            constraints: Vec::new(),
            has_segments: false,
        }
    }

    /// Sets the parent bone.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Appends a constraint to the stack.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Makes the bone a segmented B-Bone.
    pub fn with_segments(mut self) -> Self {
        self.has_segments = true;
        self
    }

    /// Whether the bone has a constraint stack.
    pub fn has_constraints(&self) -> bool {
        !self.constraints.is_empty()
    }
}

/// Drives a local transform channel of `driven_bone` from the final pose of
/// `source_bone`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoneDriver {
    /// Bone whose local transform is written.
    pub driven_bone: String,
    /// Bone whose final pose is read.
    pub source_bone: String,
    /// Channel written, e.g. `location[0]`.
    pub channel: String,
}

impl BoneDriver {
    /// Path of the driven property, used as the driver operation name.
    pub fn rna_path(&self) -> String {
        format!("pose.bones[\"{}\"].{}", self.driven_bone, self.channel)
    }
}

/// A posed object and its armature data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rig {
    /// The object carrying the pose.
    pub object: IdKey,
    /// The armature data of the object.
    pub armature: IdKey,
    /// Bones, parents before children.
    pub bones: Vec<Bone>,
    /// Drivers on pose channels.
    pub drivers: Vec<BoneDriver>,
    /// Solver of the IK chains.
    pub ik_solver: IkSolver,
}

impl Rig {
    /// A rig without bones.
    pub fn new(object: IdKey, armature: IdKey) -> Self {
        Self {
            object,
            armature,
            bones: Vec::new(),
            drivers: Vec::new(),
            ik_solver: IkSolver::Standard,
        }
    }

    /// Finds a bone by name.
    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }

    /// The parent of `bone`, if it has one that exists.
    pub fn parent_of(&self, bone: &Bone) -> Option<&Bone> {
        bone.parent.as_deref().and_then(|parent| self.bone(parent))
    }
}

/// Adds the transform component shared by every object.
fn build_transform_nodes(graph: &mut DepsGraph, object: IdNodeId) {
    let transform = graph.add_component_node(object, NodeType::Transform, "");
    let local = graph.add_operation_node(transform, OpCode::TransformLocal, "", -1);
    let eval = graph.add_operation_node(transform, OpCode::TransformEval, "", -1);
    let final_op = graph.add_operation_node(transform, OpCode::TransformFinal, "", -1);
    graph.mark_entry(local);
    graph.mark_exit(final_op);
    graph.add_operation_relation(local, eval, "Transform Local -> Eval", RelationFlags::NONE);
    graph.add_operation_relation(eval, final_op, "Transform Eval -> Final", RelationFlags::NONE);
}

/// Adds the nodes constraints read from an object outside the rig.
fn build_target_nodes(graph: &mut DepsGraph, main: &Main, id: IdKey) -> Result<(), RelationError> {
    if graph.find_id_node(id).is_some() {
        return Ok(());
    }
    let object = graph.add_id_node(main, id)?;
    build_transform_nodes(graph, object);
    let copy = graph.add_component_node(object, NodeType::CopyOnWrite, "");
    graph.add_operation_node(copy, OpCode::CopyOnWrite, "", -1);
    if main.object_type(id).is_some_and(ObjectType::has_geometry) {
        let geometry = graph.add_component_node(object, NodeType::Geometry, "");
        graph.add_operation_node(geometry, OpCode::GeometryEval, "", -1);
    }
    Ok(())
}

/// Creates the ID nodes, components and operations of `rig`, and of the
/// objects its constraints target.
pub fn build_rig_nodes(graph: &mut DepsGraph, main: &Main, rig: &Rig) -> Result<(), RelationError> {
    let object = graph.add_id_node(main, rig.object)?;
    let armature = graph.add_id_node(main, rig.armature)?;

    let armature_component = graph.add_component_node(armature, NodeType::Armature, "");
    graph.add_operation_node(armature_component, OpCode::ArmatureEval, "", -1);

    build_transform_nodes(graph, object);

    let pose = graph.add_component_node(object, NodeType::EvalPose, "");
    let pose_init = graph.add_operation_node(pose, OpCode::PoseInit, "", -1);
    graph.add_operation_node(pose, OpCode::PoseInitIk, "", -1);
    graph.add_operation_node(pose, OpCode::PoseCleanup, "", -1);
    let pose_done = graph.add_operation_node(pose, OpCode::PoseDone, "", -1);
    graph.mark_entry(pose_init);
    graph.mark_exit(pose_done);

    for bone in &rig.bones {
        let component = graph.add_component_node(object, NodeType::Bone, &bone.name);
        let bone_local = graph.add_operation_node(component, OpCode::BoneLocal, "", -1);
        graph.mark_entry(bone_local);
        graph.add_operation_node(component, OpCode::BonePoseParent, "", -1);
        if bone.has_constraints() {
            graph.add_operation_node(component, OpCode::BoneConstraints, "", -1);
        }
        graph.add_operation_node(component, OpCode::BoneReady, "", -1);
        let bone_done = graph.add_operation_node(component, OpCode::BoneDone, "", -1);
        if bone.has_segments {
            let segments = graph.add_operation_node(component, OpCode::BoneSegments, "", -1);
            graph.mark_exit(segments);
        } else {
            graph.mark_exit(bone_done);
        }

        for constraint in &bone.constraints {
            // Solvers shared by several chains with one root are added once.
            match &constraint.kind {
                ConstraintKind::Ik(ik) if !constraint.disabled => {
                    if let Some(root) = ik_chain_root(rig, bone, ik) {
                        graph.add_operation_node(pose, OpCode::PoseIkSolver, &root.name, -1);
                    }
                }
                ConstraintKind::SplineIk(spline) => {
                    let root = spline_ik_chain_root(rig, bone, spline);
                    graph.add_operation_node(pose, OpCode::PoseSplineIkSolver, &root.name, -1);
                }
                _ => {}
            }
            for target in constraint.target_objects() {
                if target != rig.object {
                    build_target_nodes(graph, main, target)?;
                }
            }
        }
    }

    if !rig.drivers.is_empty() {
        let parameters = graph.add_component_node(object, NodeType::Parameters, "");
        let entry = graph.add_operation_node(parameters, OpCode::ParametersEntry, "", -1);
        let exit = graph.add_operation_node(parameters, OpCode::ParametersExit, "", -1);
        graph.mark_entry(entry);
        graph.mark_exit(exit);
        for driver in &rig.drivers {
            graph.add_operation_node(parameters, OpCode::Driver, &driver.rna_path(), -1);
        }
    }
    Ok(())
}

/// Adds the relations of `rig`. Nodes must have been built with
/// [`build_rig_nodes`].
pub fn build_rig_relations(builder: &mut RelationBuilder<'_>, rig: &Rig) {
    let object = rig.object;
    let _object_entry = builder.trace_id(object);

    let local_transform = ComponentKey::new(object, NodeType::Transform);
    let pose_init = OperationKey::new(object, NodeType::EvalPose, OpCode::PoseInit);
    let pose_init_ik = OperationKey::new(object, NodeType::EvalPose, OpCode::PoseInitIk);
    let pose_cleanup = OperationKey::new(object, NodeType::EvalPose, OpCode::PoseCleanup);
    let pose_done = OperationKey::new(object, NodeType::EvalPose, OpCode::PoseDone);
    let none = RelationFlags::NONE;

    builder.add_relation(&local_transform, &pose_init, "Local Transform -> Pose Init", none);
    builder.add_relation(&pose_init, &pose_init_ik, "Pose Init -> Pose Init IK", none);
    builder.add_relation(&pose_init_ik, &pose_done, "Pose Init IK -> Pose Cleanup", none);
    let armature_key = OperationKey::new(rig.armature, NodeType::Armature, OpCode::ArmatureEval);
    builder.add_relation(&armature_key, &pose_init, "Data dependency", none);
    // Cleanup runs even when there are no bones.
    builder.add_relation(&pose_init, &pose_cleanup, "Init -> Cleanup", none);

    let roots = build_solver_relations(builder, rig);

    for bone in &rig.bones {
        let _bone_entry = builder.stack().trace(StackEntry::Bone(bone.name.clone()));
        let bone_key = |opcode| OperationKey::in_component(object, NodeType::Bone, bone.name.clone(), opcode);
        let bone_local = bone_key(OpCode::BoneLocal);
        let bone_pose = bone_key(OpCode::BonePoseParent);
        let bone_ready = bone_key(OpCode::BoneReady);
        let bone_done = bone_key(OpCode::BoneDone);

        builder.add_relation(&pose_init, &bone_local, "Pose Init - Bone Local", RelationFlags::GODMODE);
        builder.add_relation(&bone_local, &bone_pose, "Bone Local - Bone Pose", none);

        if let Some(parent) = &bone.parent {
            // Inside one IK chain the child follows the unsolved parent; the
            // solver moves both afterwards.
            let opcode = if roots.has_common_root(&bone.name, parent) {
                OpCode::BoneReady
            } else {
                OpCode::BoneDone
            };
            let parent_key = OperationKey::in_component(object, NodeType::Bone, parent.clone(), opcode);
            builder.add_relation(&parent_key, &bone_pose, "Parent Bone -> Child Bone", none);
        }

        if bone.has_constraints() {
            let constraints = bone_key(OpCode::BoneConstraints);
            build_constraint_targets(builder, rig, bone, &constraints, &roots);
            builder.add_relation(&bone_pose, &constraints, "Pose -> Constraints Stack", none);
            builder.add_relation(&bone_local, &constraints, "Local -> Constraints Stack", none);
            builder.add_relation(&constraints, &bone_ready, "Constraints -> Ready", none);
        } else {
            builder.add_relation(&bone_pose, &bone_ready, "Pose -> Ready", none);
        }
        builder.add_relation(&bone_ready, &bone_done, "Ready -> Done", none);

        if bone.has_segments {
            let segments = bone_key(OpCode::BoneSegments);
            builder.add_relation(&bone_done, &segments, "Done -> B-Bone Segments", none);
            if let Some(parent) = rig.parent_of(bone) {
                let prev = OperationKey::in_component(object, NodeType::Bone, parent.name.clone(), OpCode::BoneDone);
                builder.add_relation(&prev, &segments, "Prev Handle -> B-Bone Segments", none);
            }
            builder.add_relation(&segments, &pose_done, "PoseEval Result-Bone Link", RelationFlags::GODMODE);
            builder.add_relation(&segments, &pose_cleanup, "Cleanup dependency", none);
        } else {
            builder.add_relation(&bone_done, &pose_done, "PoseEval Result-Bone Link", none);
            builder.add_relation(&bone_done, &pose_cleanup, "Done -> Cleanup", none);
            builder.add_relation(&bone_ready, &pose_cleanup, "Ready -> Cleanup", none);
        }
    }

    for driver in &rig.drivers {
        let path = driver.rna_path();
        let _driver_entry = builder.stack().trace(StackEntry::Driver(path.clone()));
        let driver_key = OperationKey::new(object, NodeType::Parameters, OpCode::Driver).with_name(path);
        let driven = OperationKey::in_component(object, NodeType::Bone, driver.driven_bone.clone(), OpCode::BoneLocal);
        let source = OperationKey::in_component(object, NodeType::Bone, driver.source_bone.clone(), OpCode::BoneDone);

        builder.add_relation(&driver_key, &driven, "Driver -> Driven Property", none);
        builder.add_driver_variable_relation(&source, &driven, &driver_key, "RNA Target -> Driver");
    }
}

/// Adds the IK and spline IK solver relations and returns the chain map.
fn build_solver_relations(builder: &mut RelationBuilder<'_>, rig: &Rig) -> ChainRoots {
    let mut roots = ChainRoots::new();
    let mut pose_depends_on_local_transform = false;
    for bone in &rig.bones {
        let _bone_entry = builder.stack().trace(StackEntry::Bone(bone.name.clone()));
        for constraint in &bone.constraints {
            let _constraint_entry = builder.stack().trace(StackEntry::Constraint(constraint.name.clone()));
            match &constraint.kind {
                ConstraintKind::Ik(ik) => build_ik_pose(builder, rig, bone, constraint, ik, &mut roots),
                ConstraintKind::SplineIk(spline) => build_splineik_pose(builder, rig, bone, spline, &mut roots),
                ConstraintKind::CopyTransforms(_) | ConstraintKind::Local => {}
            }
            pose_depends_on_local_transform |= constraint.kind.needs_object_transform();
        }
    }
    if pose_depends_on_local_transform {
        let pose = ComponentKey::new(rig.object, NodeType::EvalPose);
        let transform = ComponentKey::new(rig.object, NodeType::Transform);
        builder.add_relation(&transform, &pose, "Local Transforms", RelationFlags::NONE);
    }
    roots
}

/// Connects the targets of the non-solver constraints of `bone` to its
/// constraint stack.
fn build_constraint_targets(
    builder: &mut RelationBuilder<'_>,
    rig: &Rig,
    bone: &Bone,
    constraints: &OperationKey,
    roots: &ChainRoots,
) {
    for constraint in &bone.constraints {
        let ConstraintKind::CopyTransforms(Some(target)) = &constraint.kind else {
            continue;
        };
        if constraint.disabled {
            continue;
        }
        let _constraint_entry = builder.stack().trace(StackEntry::Constraint(constraint.name.clone()));
        let description = constraint.name.as_str();
        let is_armature =
            target.object == rig.object || builder.main().object_type(target.object) == Some(ObjectType::Armature);
        match &target.subtarget {
            Some(subtarget) if is_armature => {
                // A bone of the same chain is read before the solver runs.
                let opcode = if target.object == rig.object && roots.has_common_root(&bone.name, subtarget) {
                    OpCode::BoneReady
                } else {
                    OpCode::BoneDone
                };
                let key = OperationKey::in_component(target.object, NodeType::Bone, subtarget.clone(), opcode);
                builder.add_relation(&key, constraints, description, RelationFlags::NONE);
            }
            _ => {
                let transform = ComponentKey::new(target.object, NodeType::Transform);
                builder.add_relation(&transform, constraints, description, RelationFlags::NONE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IdKind;
    use crate::{detect_cycles, evaluation_order};

    fn arm_rig(main: &mut Main) -> Rig {
        let object = main.add_object("Rig");
        let armature = main.add("Skeleton", IdKind::Armature);
        let mut rig = Rig::new(object, armature);
        rig.bones = vec![
            Bone::new("Root"),
            Bone::new("Arm").with_parent("Root").with_constraint(Constraint::local("Limit Rotation")),
            Bone::new("Hand").with_parent("Arm").with_segments(),
        ];
        rig
    }

    fn build(main: &Main, rig: &Rig) -> (DepsGraph, usize) {
        let mut graph = DepsGraph::new();
        build_rig_nodes(&mut graph, main, rig).unwrap();
        let mut builder = RelationBuilder::new(main, &mut graph);
        build_rig_relations(&mut builder, rig);
        let failed = builder.failed_relation_count();
        (graph, failed)
    }

    fn relation_between(graph: &DepsGraph, from: &OperationKey, to: &OperationKey) -> Option<String> {
        let (from, to) = (find(graph, from), find(graph, to));
        graph
            .relations()
            .find(|(_, r)| r.from == crate::RelationSource::Operation(from) && r.to == to)
            .map(|(_, r)| r.description.clone())
    }

    #[test]
    fn test_rig_builds_without_failures() {
        let mut main = Main::new();
        let rig = arm_rig(&mut main);
        let mut graph = DepsGraph::new();
        build_rig_nodes(&mut graph, &main, &rig).unwrap();
        let mut builder = RelationBuilder::new(&main, &mut graph);
        build_rig_relations(&mut builder, &rig);
        assert_eq!(builder.failed_relation_count(), 0);

        assert!(detect_cycles(&mut graph).is_empty());
        let order = evaluation_order(&graph).unwrap();
        assert_eq!(order.len(), graph.operation_count());

        let position = |key: &OperationKey| {
            let op = find(&graph, key);
            order.iter().position(|&o| o == op).unwrap()
        };
        let bone_op = |bone: &str, opcode| OperationKey::in_component(rig.object, NodeType::Bone, bone, opcode);
        assert!(position(&bone_op("Root", OpCode::BoneDone)) < position(&bone_op("Arm", OpCode::BonePoseParent)));
        assert!(position(&bone_op("Arm", OpCode::BoneDone)) < position(&bone_op("Hand", OpCode::BoneSegments)));
        let pose_done = OperationKey::new(rig.object, NodeType::EvalPose, OpCode::PoseDone);
        assert!(position(&bone_op("Hand", OpCode::BoneSegments)) < position(&pose_done));
    }

    fn find(graph: &DepsGraph, key: &OperationKey) -> crate::OperationId {
        use crate::key::NodeKey;
        match key.get_node(graph) {
            Some(crate::NodeRef::Operation(op)) => op,
            other => panic!("{key:?} resolved to {other:?}"),
        }
    }

    #[test]
    fn test_self_driver_is_suppressed() {
        let mut main = Main::new();
        let mut rig = arm_rig(&mut main);
        rig.drivers.push(BoneDriver {
            driven_bone: "Arm".into(),
            source_bone: "Arm".into(),
            channel: "rotation_euler[0]".into(),
        });
        rig.drivers.push(BoneDriver {
            driven_bone: "Hand".into(),
            source_bone: "Root".into(),
            channel: "location[1]".into(),
        });
        let mut graph = DepsGraph::new();
        build_rig_nodes(&mut graph, &main, &rig).unwrap();
        let mut builder = RelationBuilder::new(&main, &mut graph);
        build_rig_relations(&mut builder, &rig);
        assert_eq!(builder.failed_relation_count(), 0);

        let variable_relations = graph
            .relations()
            .filter(|(_, r)| r.description == "RNA Target -> Driver")
            .count();
        assert_eq!(variable_relations, 1);
        assert!(detect_cycles(&mut graph).is_empty());
    }

    #[test]
    fn test_missing_parent_is_logged_and_skipped() {
        let mut main = Main::new();
        let mut rig = arm_rig(&mut main);
        rig.bones.push(Bone::new("Orphan").with_parent("Nowhere"));
        let mut graph = DepsGraph::new();
        build_rig_nodes(&mut graph, &main, &rig).unwrap();
        let mut builder = RelationBuilder::new(&main, &mut graph);
        build_rig_relations(&mut builder, &rig);
        assert_eq!(builder.failed_relation_count(), 1);
        assert!(builder.stack().is_empty());
        assert!(evaluation_order(&graph).is_ok());
    }

    #[test]
    fn test_constraint_kinds() {
        assert!(!Constraint::local("Limit").kind.needs_object_transform());
        let copy = ConstraintKind::CopyTransforms(None);
        assert!(copy.needs_object_transform());
        assert!(Constraint::local("Limit").target_objects().is_empty());
    }

    #[test]
    fn test_ik_solver_named_after_chain_root() {
        let mut main = Main::new();
        let mut rig = arm_rig(&mut main);
        let target = main.add_typed_object("Target", ObjectType::Empty);
        let ik = IkConstraint {
            target: Some(ConstraintTarget::object(target)),
            chain_length: 2,
            ..IkConstraint::default()
        };
        rig.bones[2] = rig.bones[2].clone().with_constraint(Constraint::new("IK", ConstraintKind::Ik(ik)));
        let (graph, failed) = build(&main, &rig);
        assert_eq!(failed, 0);

        let solver = OperationKey::new(rig.object, NodeType::EvalPose, OpCode::PoseIkSolver).with_name("Arm");
        let bone_op = |bone: &str, opcode| OperationKey::in_component(rig.object, NodeType::Bone, bone, opcode);
        assert_eq!(
            relation_between(&graph, &bone_op("Arm", OpCode::BoneReady), &bone_op("Hand", OpCode::BonePoseParent)),
            Some("Parent Bone -> Child Bone".to_string())
        );
        let hand_pose = bone_op("Hand", OpCode::BonePoseParent);
        assert!(relation_between(&graph, &bone_op("Arm", OpCode::BoneDone), &hand_pose).is_none());
        let target_final = OperationKey::new(target, NodeType::Transform, OpCode::TransformFinal);
        assert_eq!(relation_between(&graph, &target_final, &solver), Some("IK".to_string()));
        assert!(graph.find_component(target, NodeType::CopyOnWrite, "").is_some());
        // Root is outside the chain and keeps the plain parent link.
        let arm_pose = bone_op("Arm", OpCode::BonePoseParent);
        assert!(relation_between(&graph, &bone_op("Root", OpCode::BoneDone), &arm_pose).is_some());
    }

    #[test]
    fn test_disabled_ik_adds_no_solver() {
        let mut main = Main::new();
        let mut rig = arm_rig(&mut main);
        let mut constraint = Constraint::new("IK", ConstraintKind::Ik(IkConstraint::default()));
        constraint.disabled = true;
        rig.bones[2] = rig.bones[2].clone().with_constraint(constraint);
        let (graph, failed) = build(&main, &rig);
        assert_eq!(failed, 0);
        assert!(graph.operations().all(|(_, op)| op.opcode() != OpCode::PoseIkSolver));
    }

    #[test]
    fn test_copy_transforms_inside_chain_reads_ready() {
        let mut main = Main::new();
        let mut rig = arm_rig(&mut main);
        // Chain length 0 runs up to Root.
        let ik = ConstraintKind::Ik(IkConstraint::default());
        rig.bones[2] = rig.bones[2].clone().with_constraint(Constraint::new("IK", ik));
        let copy = ConstraintKind::CopyTransforms(Some(ConstraintTarget::sub(rig.object, "Root")));
        rig.bones[1] = rig.bones[1].clone().with_constraint(Constraint::new("Copy Root", copy));
        let (mut graph, failed) = build(&main, &rig);
        assert_eq!(failed, 0);

        let bone_op = |bone: &str, opcode| OperationKey::in_component(rig.object, NodeType::Bone, bone, opcode);
        assert_eq!(
            relation_between(&graph, &bone_op("Root", OpCode::BoneReady), &bone_op("Arm", OpCode::BoneConstraints)),
            Some("Copy Root".to_string())
        );
        let arm_constraints = bone_op("Arm", OpCode::BoneConstraints);
        assert!(relation_between(&graph, &bone_op("Root", OpCode::BoneDone), &arm_constraints).is_none());
        assert!(detect_cycles(&mut graph).is_empty());
    }
}
