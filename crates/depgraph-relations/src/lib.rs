//! Depgraph Relations - operation dependency graphs built from keys
//!
//! Scene evaluation is split into small operations (evaluate a transform,
//! pose a bone, run a driver). This crate holds the graph of those
//! operations and the machinery that connects them.
//!
//! # Core Abstractions
//!
//! - [`DepsGraph`] - Arena of ID, component and operation nodes plus the
//!   time source, and the relations between operations
//! - [`NodeKey`] - Anything that names a node: [`ComponentKey`],
//!   [`OperationKey`], [`TimeSourceKey`]
//! - [`RelationBuilder`] - Resolves keys to entry and exit operations and
//!   connects them; unresolved relations are logged and skipped
//! - [`BuilderStack`] - What the builder is working on, printed with
//!   failed relations
//!
//! # Analysis
//!
//! - [`detect_cycles`] - Flags relations closing a cycle as
//!   [`RelationFlags::CYCLIC`]
//! - [`evaluation_order`] - Dependency order over non-cyclic relations
//! - [`DepsGraph::to_dot`] - Graphviz export
//!
//! # Example
//!
//! ```rust,ignore
//! use depgraph_relations::{DepsGraph, Main, RelationBuilder, build_rig_nodes, build_rig_relations};
//!
//! let mut graph = DepsGraph::new();
//! build_rig_nodes(&mut graph, &main, &rig)?;
//! let mut builder = RelationBuilder::new(&main, &mut graph);
//! build_rig_relations(&mut builder, &rig);
//! detect_cycles(&mut graph);
//! let order = evaluation_order(&graph)?;
//! ```

pub mod builder;
pub mod cycles;
pub mod depsgraph;
pub mod error;
pub mod id;
pub mod key;
pub mod node_type;
pub mod order;
pub mod rig;
pub mod stack;

pub use builder::{NodeHandle, RelationBuilder};
pub use cycles::{CycleReport, detect_cycles};
pub use depsgraph::{
    ComponentId, ComponentNode, DepsGraph, IdNode, IdNodeId, NodeRef, OperationId, OperationNode, Relation,
    RelationFlags, RelationId, RelationSource, TimeSourceNode,
};
pub use error::RelationError;
pub use id::{
    IdData, IdKey, IdKind, IdType, Main, ObjectData, ObjectType, RigidBodyMeshSource, RigidBodyObject, RigidBodyShape,
};
pub use key::{ComponentKey, NodeKey, OperationKey, TimeSourceKey};
pub use node_type::{NodeType, OpCode};
pub use order::evaluation_order;
pub use rig::ik::ChainRoots;
pub use rig::{
    Bone, BoneDriver, Constraint, ConstraintKind, ConstraintTarget, IkConstraint, IkSolver, Rig, SplineIkConstraint,
    build_rig_nodes, build_rig_relations,
};
pub use stack::{BuilderStack, ScopedEntry, StackEntry};
