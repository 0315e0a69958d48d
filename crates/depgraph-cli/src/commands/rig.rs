//! Build the relations of a demo rig.

use std::path::PathBuf;

use anyhow::ensure;
use clap::Args;
use depgraph_config::Config;
use depgraph_relations::{
    Bone, BoneDriver, Constraint, ConstraintKind, ConstraintTarget, DepsGraph, IdKind, IkConstraint, Main,
    ObjectType, RelationBuilder, Rig, build_rig_nodes, build_rig_relations, detect_cycles, evaluation_order,
};
use serde::Serialize;

/// Build the relations of a demo rig and print the evaluation order.
#[derive(Args)]
pub struct RigArgs {
    /// Number of bones in the chain
    #[arg(short, long, default_value_t = 3)]
    pub bones: usize,

    /// Add a driver on the first bone that reads its own pose (skipped as a self dependency)
    #[arg(long)]
    pub self_driver: bool,

    /// Add a driver on the first bone that reads the last bone, closing a cycle
    #[arg(long)]
    pub cycle: bool,

    /// Give the last bone an IK constraint with this chain length (0 for the whole chain)
    #[arg(long, value_name = "CHAIN_LENGTH")]
    pub ik: Option<usize>,

    /// Also write the operation graph as DOT to this file
    #[arg(long)]
    pub dot: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct RigSummary {
    operations: usize,
    relations: usize,
    failed_relations: usize,
    cycles: Vec<Vec<String>>,
    order: Vec<String>,
}

fn bone_name(index: usize) -> String {
    format!("Bone{index}")
}

/// A chain of bones, every other one constrained, the last one segmented
/// and optionally reaching for an IK target.
fn chain_rig(main: &mut Main, args: &RigArgs) -> Rig {
    let object = main.add_typed_object("Rig", ObjectType::Armature);
    let ik_target = args.ik.map(|_| main.add_typed_object("Target", ObjectType::Empty));
    let armature = main.add("RigData", IdKind::Armature);
    let bones = (0..args.bones)
        .map(|i| {
            let mut bone = Bone::new(bone_name(i));
            if i > 0 {
                bone = bone.with_parent(bone_name(i - 1));
            }
            if i % 2 == 1 {
                bone = bone.with_constraint(Constraint::local("Limit Rotation"));
            }
            if i + 1 == args.bones
                && let (Some(chain_length), Some(target)) = (args.ik, ik_target)
            {
                let ik = IkConstraint {
                    target: Some(ConstraintTarget::object(target)),
                    chain_length,
                    ..IkConstraint::default()
                };
                bone = bone.with_constraint(Constraint::new("IK", ConstraintKind::Ik(ik)));
            }
            if i + 1 == args.bones && i > 0 {
                bone = bone.with_segments();
            }
            bone
        })
        .collect();

    let mut drivers = Vec::new();
    if args.self_driver {
        drivers.push(BoneDriver {
            driven_bone: bone_name(0),
            source_bone: bone_name(0),
            channel: "rotation_euler[2]".to_string(),
        });
    }
    if args.cycle {
        drivers.push(BoneDriver {
            driven_bone: bone_name(0),
            source_bone: bone_name(args.bones - 1),
            channel: "location[0]".to_string(),
        });
    }
    let mut rig = Rig::new(object, armature);
    rig.bones = bones;
    rig.drivers = drivers;
    rig
}

/// Run the rig command.
pub fn run(args: RigArgs, _config: &Config) -> anyhow::Result<()> {
    ensure!(args.bones > 0, "a rig needs at least one bone");

    let mut main = Main::new();
    let rig = chain_rig(&mut main, &args);
    let mut graph = DepsGraph::new();
    build_rig_nodes(&mut graph, &main, &rig)?;
    let failed_relations = {
        let mut builder = RelationBuilder::new(&main, &mut graph);
        build_rig_relations(&mut builder, &rig);
        builder.failed_relation_count()
    };
    let reports = detect_cycles(&mut graph);
    let order = evaluation_order(&graph)?;
    tracing::debug!(operations = graph.operation_count(), cycles = reports.len(), "rig built");

    if let Some(path) = &args.dot {
        super::write_output(path, &graph.to_dot())?;
    }

    let summary = RigSummary {
        operations: graph.operation_count(),
        relations: graph.relation_count(),
        failed_relations,
        cycles: reports
            .iter()
            .map(|r| r.path.iter().map(|op| graph.operation_identifier(*op)).collect())
            .collect(),
        order: order.iter().map(|op| graph.operation_identifier(*op)).collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_summary(&summary, &graph, &reports, &rig);
    if let Some(path) = &args.dot {
        println!();
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_summary(summary: &RigSummary, graph: &DepsGraph, reports: &[depgraph_relations::CycleReport], rig: &Rig) {
    println!("Rig: {} bones, {} drivers", rig.bones.len(), rig.drivers.len());
    println!("Operations:       {}", summary.operations);
    println!("Relations:        {}", summary.relations);
    println!("Failed relations: {}", summary.failed_relations);
    println!("Cycles:           {}", reports.len());
    for report in reports {
        print!("{}", report.describe(graph));
    }
    println!();
    println!("Evaluation order:");
    for (i, identifier) in summary.order.iter().enumerate() {
        println!("  {:>3}. {identifier}", i + 1);
    }
}
