//! IK and spline IK solver relations.
//!
//! Each solver is one `POSE_IK_SOLVER` or `POSE_SPLINE_IK_SOLVER` operation
//! of the pose component, named after the root bone of its chain. Bones of
//! the chain feed their `BONE_READY` into the solver, which then writes
//! their `BONE_DONE`. [`ChainRoots`] remembers which chains a bone belongs
//! to, so parenting inside one chain can skip the solver result.

use std::collections::{BTreeSet, HashMap};

use crate::builder::RelationBuilder;
use crate::depsgraph::RelationFlags;
use crate::id::{IdKey, ObjectType};
use crate::key::{ComponentKey, OperationKey};
use crate::node_type::{NodeType, OpCode};

use super::{Bone, Constraint, ConstraintTarget, IkConstraint, IkSolver, Rig, SplineIkConstraint};

/// Longest chain a solver walks, whatever the configured length.
const MAX_CHAIN_LENGTH: usize = 255;

/// Roots of the IK chains every bone takes part in.
#[derive(Debug, Default)]
pub struct ChainRoots {
    roots: HashMap<String, BTreeSet<String>>,
}

impl ChainRoots {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `bone` belongs to the chain rooted at `root`.
    pub fn add_bone(&mut self, bone: &str, root: &str) {
        self.roots.entry(bone.to_string()).or_default().insert(root.to_string());
    }

    /// True if both bones belong to at least one common chain.
    pub fn has_common_root(&self, a: &str, b: &str) -> bool {
        match (self.roots.get(a), self.roots.get(b)) {
            (Some(a), Some(b)) => !a.is_disjoint(b),
            _ => false,
        }
    }
}

/// Root bone of the chain an IK constraint on `owner` solves.
///
/// The chain starts at the owner when the tip is included, at its parent
/// otherwise, and runs `chain_length` bones up (`0` runs to the top).
/// Returns `None` when the chain would be empty.
pub fn ik_chain_root<'r>(rig: &'r Rig, owner: &'r Bone, ik: &IkConstraint) -> Option<&'r Bone> {
    let mut bone = if ik.use_tip { owner } else { rig.parent_of(owner)? };
    let mut count = 1;
    while count != ik.chain_length && count <= MAX_CHAIN_LENGTH {
        let Some(parent) = rig.parent_of(bone) else {
            break;
        };
        bone = parent;
        count += 1;
    }
    Some(bone)
}

/// Root bone of the chain a spline IK constraint on `owner` solves: the
/// `chain_length`-th bone counting the owner as the first.
pub fn spline_ik_chain_root<'r>(rig: &'r Rig, owner: &'r Bone, spline: &SplineIkConstraint) -> &'r Bone {
    let mut bone = owner;
    let mut count = 1;
    while count < spline.chain_length.min(MAX_CHAIN_LENGTH) {
        let Some(parent) = rig.parent_of(bone) else {
            break;
        };
        bone = parent;
        count += 1;
    }
    bone
}

fn bone_op(object: IdKey, bone: &str, opcode: OpCode) -> OperationKey {
    OperationKey::in_component(object, NodeType::Bone, bone, opcode)
}

/// Key of the IK solver operation rooted at `root`.
pub fn ik_solver_key(object: IdKey, root: &str) -> OperationKey {
    OperationKey::new(object, NodeType::EvalPose, OpCode::PoseIkSolver).with_name(root)
}

/// Key of the spline IK solver operation rooted at `root`.
pub fn spline_ik_solver_key(object: IdKey, root: &str) -> OperationKey {
    OperationKey::new(object, NodeType::EvalPose, OpCode::PoseSplineIkSolver).with_name(root)
}

/// Adds the relations of the IK constraint `constraint` on `owner`.
pub fn build_ik_pose(
    builder: &mut RelationBuilder<'_>,
    rig: &Rig,
    owner: &Bone,
    constraint: &Constraint,
    ik: &IkConstraint,
    roots: &mut ChainRoots,
) {
    // Disabled constraints come back as temporary constraints while
    // transforming, never as relations.
    if constraint.disabled {
        return;
    }
    let Some(root) = ik_chain_root(rig, owner, ik) else {
        return;
    };
    let object = rig.object;
    let init_ik = OperationKey::new(object, NodeType::EvalPose, OpCode::PoseInitIk);
    let solver = ik_solver_key(object, &root.name);
    let pose_cleanup = OperationKey::new(object, NodeType::EvalPose, OpCode::PoseCleanup);
    let none = RelationFlags::NONE;

    // There is one Init IK per armature, so this risks spurious cycles.
    let is_itasc = rig.ik_solver == IkSolver::Itasc;
    if is_itasc || ik.animated {
        let owner_local = bone_op(object, &owner.name, OpCode::BoneLocal);
        builder.add_relation(&owner_local, &init_ik, "IK Constraint -> Init IK Tree", none);
    }
    builder.add_relation(&init_ik, &solver, "Init IK -> IK Solver", none);
    builder.add_relation(&solver, &pose_cleanup, "IK Solver -> Cleanup", RelationFlags::GODMODE);

    // iTaSC reads the targets while building its tree.
    let target_dependent = if is_itasc { &init_ik } else { &solver };
    if let Some(target) = &ik.target {
        build_ik_target(builder, rig, target, target_dependent, &constraint.name);
        if target.object == object
            && let Some(subtarget) = &target.subtarget
        {
            // Keeps the target's constraints out of the chain it controls.
            roots.add_bone(subtarget, &root.name);
        }
    }
    if let Some(pole) = &ik.pole_target {
        build_ik_target(builder, rig, pole, target_dependent, &constraint.name);
    }

    let target_name = ik
        .target
        .as_ref()
        .map_or_else(|| "none".to_string(), |t| builder.main().display_name(t.object));
    tracing::debug!(
        bone = %owner.name,
        target = %target_name,
        chain_length = ik.chain_length,
        root = %root.name,
        "building IK chain"
    );

    let Some(mut bone) = (if ik.use_tip { Some(owner) } else { rig.parent_of(owner) }) else {
        return;
    };
    roots.add_bone(&bone.name, &root.name);
    let owner_ready = bone_op(object, &bone.name, OpCode::BoneReady);
    builder.add_relation(&owner_ready, &solver, "IK Solver Owner", none);

    let mut count = 0;
    loop {
        let done = bone_op(object, &bone.name, OpCode::BoneDone);
        if bone.name == owner.name {
            builder.add_relation(&solver, &done, "IK Solver Result", none);
        } else {
            let ready = bone_op(object, &bone.name, OpCode::BoneReady);
            builder.add_relation(&ready, &solver, "IK Chain Parent", none);
            builder.add_relation(&solver, &done, "IK Chain Result", none);
        }
        roots.add_bone(&bone.name, &root.name);
        count += 1;
        if count == ik.chain_length || count > MAX_CHAIN_LENGTH {
            break;
        }
        let Some(parent) = rig.parent_of(bone) else {
            break;
        };
        bone = parent;
    }

    let pose_done = OperationKey::new(object, NodeType::EvalPose, OpCode::PoseDone);
    builder.add_relation(&solver, &pose_done, "PoseEval Result-Bone Link", none);
    build_inter_ik_chains(builder, rig, &solver, root, roots);
}

/// Connects an IK target or pole target to the solver part that reads it.
fn build_ik_target(
    builder: &mut RelationBuilder<'_>,
    rig: &Rig,
    target: &ConstraintTarget,
    target_dependent: &OperationKey,
    description: &str,
) {
    let init_ik = OperationKey::new(rig.object, NodeType::EvalPose, OpCode::PoseInitIk);
    let none = RelationFlags::NONE;
    if target.object != rig.object {
        let transform = ComponentKey::new(target.object, NodeType::Transform);
        builder.add_relation(&transform, target_dependent, description, none);
        // The copied target has to exist by the time the IK tree is built.
        let copy = ComponentKey::new(target.object, NodeType::CopyOnWrite);
        builder.add_relation(&copy, &init_ik, "IK Target CoW -> Init IK Tree", RelationFlags::CHECK_BEFORE_ADD);
    }
    let Some(subtarget) = &target.subtarget else {
        return;
    };
    let object_type = if target.object == rig.object {
        Some(ObjectType::Armature)
    } else {
        builder.main().object_type(target.object)
    };
    match object_type {
        Some(ObjectType::Armature) => {
            let bone_done = bone_op(target.object, subtarget, OpCode::BoneDone);
            builder.add_relation(&bone_done, target_dependent, description, none);
        }
        // Vertex groups are not represented separately.
        Some(kind) if kind.has_vertex_groups() => {
            let geometry = ComponentKey::new(target.object, NodeType::Geometry);
            builder.add_relation(&geometry, target_dependent, description, none);
        }
        _ => {}
    }
}

/// Adds the relations of the spline IK constraint on `owner`.
pub fn build_splineik_pose(
    builder: &mut RelationBuilder<'_>,
    rig: &Rig,
    owner: &Bone,
    spline: &SplineIkConstraint,
    roots: &mut ChainRoots,
) {
    let object = rig.object;
    let root = spline_ik_chain_root(rig, owner, spline);
    let init_ik = OperationKey::new(object, NodeType::EvalPose, OpCode::PoseInitIk);
    let solver = spline_ik_solver_key(object, &root.name);
    let pose_cleanup = OperationKey::new(object, NodeType::EvalPose, OpCode::PoseCleanup);
    let none = RelationFlags::NONE;

    builder.add_relation(&init_ik, &solver, "Init IK -> IK Solver", none);
    builder.add_relation(&solver, &pose_cleanup, "IK Solver -> Cleanup", none);
    let owner_ready = bone_op(object, &owner.name, OpCode::BoneReady);
    builder.add_relation(&owner_ready, &solver, "Spline IK Solver Owner", RelationFlags::GODMODE);

    if let Some(curve) = spline.target {
        let path = ComponentKey::new(curve, NodeType::Geometry);
        builder.add_relation(&path, &solver, "Curve.Path -> Spline IK", none);
        let transform = ComponentKey::new(curve, NodeType::Transform);
        builder.add_relation(&transform, &solver, "Curve.Transform -> Spline IK", none);
    }

    let owner_done = bone_op(object, &owner.name, OpCode::BoneDone);
    builder.add_relation(&solver, &owner_done, "Spline IK Result", none);
    roots.add_bone(&owner.name, &root.name);

    let mut parent = rig.parent_of(owner);
    let mut count = 1;
    while let Some(bone) = parent
        && count < spline.chain_length.min(MAX_CHAIN_LENGTH)
    {
        let ready = bone_op(object, &bone.name, OpCode::BoneReady);
        builder.add_relation(&ready, &solver, "Spline IK Solver Update", none);
        let done = bone_op(object, &bone.name, OpCode::BoneDone);
        builder.add_relation(&solver, &done, "Spline IK Solver Result", none);
        roots.add_bone(&bone.name, &root.name);
        parent = rig.parent_of(bone);
        count += 1;
    }

    let pose_done = OperationKey::new(object, NodeType::EvalPose, OpCode::PoseDone);
    builder.add_relation(&solver, &pose_done, "PoseEval Result-Bone Link", none);
    build_inter_ik_chains(builder, rig, &solver, root, roots);
}

/// Makes `solver` wait for the deepest ancestor of `root` that shares a
/// chain with it, when chains overlap.
fn build_inter_ik_chains(
    builder: &mut RelationBuilder<'_>,
    rig: &Rig,
    solver: &OperationKey,
    root: &Bone,
    roots: &ChainRoots,
) {
    let mut deepest = None;
    let mut ancestor = rig.parent_of(root);
    while let Some(bone) = ancestor {
        if !roots.has_common_root(&root.name, &bone.name) {
            break;
        }
        deepest = Some(bone);
        ancestor = rig.parent_of(bone);
    }
    if let Some(bone) = deepest {
        let done = bone_op(rig.object, &bone.name, OpCode::BoneDone);
        builder.add_relation(&done, solver, "IK Chain Overlap", RelationFlags::NONE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{IdKind, Main};

    fn chain(main: &mut Main, length: usize) -> Rig {
        let object = main.add_object("Rig");
        let armature = main.add("Skeleton", IdKind::Armature);
        let mut rig = Rig::new(object, armature);
        for i in 0..length {
            let mut bone = Bone::new(format!("B{i}"));
            if i > 0 {
                bone = bone.with_parent(format!("B{}", i - 1));
            }
            rig.bones.push(bone);
        }
        rig
    }

    #[test]
    fn test_chain_roots() {
        let mut roots = ChainRoots::new();
        roots.add_bone("Hand", "Shoulder");
        roots.add_bone("Forearm", "Shoulder");
        roots.add_bone("Forearm", "Elbow");
        roots.add_bone("Finger", "Elbow");
        assert!(roots.has_common_root("Hand", "Forearm"));
        assert!(roots.has_common_root("Finger", "Forearm"));
        assert!(!roots.has_common_root("Hand", "Finger"));
        assert!(!roots.has_common_root("Hand", "Unknown"));
    }

    #[test]
    fn test_ik_chain_root() {
        let mut main = Main::new();
        let rig = chain(&mut main, 5);
        let tip = &rig.bones[4];
        let mut ik = IkConstraint {
            chain_length: 2,
            ..IkConstraint::default()
        };
        assert_eq!(ik_chain_root(&rig, tip, &ik).map(|b| b.name.as_str()), Some("B3"));

        ik.use_tip = false;
        assert_eq!(ik_chain_root(&rig, tip, &ik).map(|b| b.name.as_str()), Some("B2"));

        ik.chain_length = 0;
        assert_eq!(ik_chain_root(&rig, tip, &ik).map(|b| b.name.as_str()), Some("B0"));

        // Without the tip a root bone has no chain.
        assert!(ik_chain_root(&rig, &rig.bones[0], &ik).is_none());
    }

    #[test]
    fn test_spline_ik_chain_root() {
        let mut main = Main::new();
        let rig = chain(&mut main, 4);
        let tip = &rig.bones[3];
        let spline = |chain_length| SplineIkConstraint {
            target: None,
            chain_length,
        };
        assert_eq!(spline_ik_chain_root(&rig, tip, &spline(1)).name, "B3");
        assert_eq!(spline_ik_chain_root(&rig, tip, &spline(3)).name, "B1");
        assert_eq!(spline_ik_chain_root(&rig, tip, &spline(10)).name, "B0");
    }
}
