//! Component types and operation codes.

use std::fmt;

/// Kind of a component node. An ID node has at most one component per
/// `(NodeType, name)` pair; only bones use non-empty names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    /// Custom properties and driven parameters.
    Parameters,
    /// Animation data evaluation.
    Animation,
    /// Object transform.
    Transform,
    /// Evaluated geometry.
    Geometry,
    /// Armature data.
    Armature,
    /// Pose evaluation of a rigged object.
    EvalPose,
    /// One bone of a pose. Named after the bone.
    Bone,
    /// Copy-on-write update of the data-block.
    CopyOnWrite,
    /// Material and shading state.
    Shading,
    /// Object visibility.
    Visibility,
    /// Point cache reset.
    PointCache,
    /// Anything else.
    Generic,
}

impl NodeType {
    /// Upper-case name used in identifiers and DOT output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parameters => "PARAMETERS",
            Self::Animation => "ANIMATION",
            Self::Transform => "TRANSFORM",
            Self::Geometry => "GEOMETRY",
            Self::Armature => "ARMATURE",
            Self::EvalPose => "EVAL_POSE",
            Self::Bone => "BONE",
            Self::CopyOnWrite => "COPY_ON_WRITE",
            Self::Shading => "SHADING",
            Self::Visibility => "VISIBILITY",
            Self::PointCache => "POINT_CACHE",
            Self::Generic => "GENERIC",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an operation node computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum OpCode {
    Operation,
    ParametersEntry,
    ParametersEval,
    ParametersExit,
    AnimationEval,
    Driver,
    TransformInit,
    TransformLocal,
    TransformParent,
    TransformConstraints,
    TransformEval,
    TransformFinal,
    GeometryEval,
    ArmatureEval,
    PoseInit,
    PoseInitIk,
    PoseCleanup,
    PoseDone,
    PoseIkSolver,
    PoseSplineIkSolver,
    BoneLocal,
    BonePoseParent,
    BoneConstraints,
    BoneReady,
    BoneDone,
    BoneSegments,
    CopyOnWrite,
    Shading,
    Visibility,
    PointCacheReset,
}

impl OpCode {
    /// Upper-case name used in identifiers and DOT output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operation => "OPERATION",
            Self::ParametersEntry => "PARAMETERS_ENTRY",
            Self::ParametersEval => "PARAMETERS_EVAL",
            Self::ParametersExit => "PARAMETERS_EXIT",
            Self::AnimationEval => "ANIMATION_EVAL",
            Self::Driver => "DRIVER",
            Self::TransformInit => "TRANSFORM_INIT",
            Self::TransformLocal => "TRANSFORM_LOCAL",
            Self::TransformParent => "TRANSFORM_PARENT",
            Self::TransformConstraints => "TRANSFORM_CONSTRAINTS",
            Self::TransformEval => "TRANSFORM_EVAL",
            Self::TransformFinal => "TRANSFORM_FINAL",
            Self::GeometryEval => "GEOMETRY_EVAL",
            Self::ArmatureEval => "ARMATURE_EVAL",
            Self::PoseInit => "POSE_INIT",
            Self::PoseInitIk => "POSE_INIT_IK",
            Self::PoseCleanup => "POSE_CLEANUP",
            Self::PoseDone => "POSE_DONE",
            Self::PoseIkSolver => "POSE_IK_SOLVER",
            Self::PoseSplineIkSolver => "POSE_SPLINE_IK_SOLVER",
            Self::BoneLocal => "BONE_LOCAL",
            Self::BonePoseParent => "BONE_POSE_PARENT",
            Self::BoneConstraints => "BONE_CONSTRAINTS",
            Self::BoneReady => "BONE_READY",
            Self::BoneDone => "BONE_DONE",
            Self::BoneSegments => "BONE_SEGMENTS",
            Self::CopyOnWrite => "COPY_ON_WRITE",
            Self::Shading => "SHADING",
            Self::Visibility => "VISIBILITY",
            Self::PointCacheReset => "POINT_CACHE_RESET",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
