//! Integration tests for depgraph-cli.
//!
//! Every test runs the `depgraph` binary with `--config` pointing into a
//! temporary directory, so files in the working directory or the user
//! configuration never leak in.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Runs `depgraph` with the given config path and arguments.
fn depgraph(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_depgraph"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run depgraph")
}

/// Runs `depgraph` with default configuration and returns stdout, asserting
/// success.
fn run_ok(args: &[&str]) -> String {
    let dir = TempDir::new().unwrap();
    let output = depgraph(&dir.path().join("none.toml"), args);
    assert!(
        output.status.success(),
        "depgraph {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ---------------------------------------------------------------------------
// CLI binary tests -- `depgraph eval`
// ---------------------------------------------------------------------------

#[test]
fn cli_eval_uses_demo_defaults() {
    let stdout = run_ok(&["eval", "arith"]);
    assert!(stdout.contains("result = 9.0"), "got: {stdout}");
}

#[test]
fn cli_eval_takes_inputs() {
    let stdout = run_ok(&["eval", "arith", "--input", "a=2", "-i", "c=10"]);
    assert!(stdout.contains("result = 40.0"), "got: {stdout}");
}

#[test]
fn cli_eval_switch_skips_unused_branch() {
    let stdout = run_ok(&["eval", "switch", "--input", "condition=false", "--stats"]);
    assert!(stdout.contains("value = 4.0"), "got: {stdout}");
    let square = stdout
        .lines()
        .find(|line| line.trim_start().starts_with("Square"))
        .expect("stats should list Square");
    assert_eq!(square.split_whitespace().last(), Some("0"));
}

#[test]
fn cli_eval_nested_graph() {
    let stdout = run_ok(&["eval", "nested"]);
    assert!(stdout.contains("result = 17.0"), "got: {stdout}");
}

#[test]
fn cli_eval_threads_agree() {
    let single = run_ok(&["eval", "arith", "--threads", "1", "-i", "b=5"]);
    let multi = run_ok(&["eval", "arith", "--threads", "4", "-i", "b=5"]);
    assert_eq!(single, multi);
}

#[test]
fn cli_eval_unknown_input_fails() {
    let dir = TempDir::new().unwrap();
    let output = depgraph(&dir.path().join("none.toml"), &["eval", "arith", "--input", "z=1"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown input 'z'"), "got: {stderr}");
}

// ---------------------------------------------------------------------------
// CLI binary tests -- `depgraph dot`
// ---------------------------------------------------------------------------

#[test]
fn cli_dot_prints_graph() {
    let stdout = run_ok(&["dot", "switch"]);
    assert!(stdout.starts_with("digraph {"), "got: {stdout}");
    assert!(stdout.contains("Switch"));
}

#[test]
fn cli_dot_writes_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out").join("arith.dot");
    let output = depgraph(
        &dir.path().join("none.toml"),
        &["dot", "arith", "-o", path.to_str().unwrap()],
    );
    assert!(output.status.success());
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("Multiply"));
}

#[test]
fn cli_dot_uses_configured_output_dir() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("depgraph.toml");
    let graphs = dir.path().join("graphs");
    std::fs::write(&config, format!("[dot]\noutput_dir = {:?}\n", graphs.to_str().unwrap())).unwrap();

    let output = depgraph(&config, &["dot", "nested"]);
    assert!(output.status.success());
    assert!(graphs.join("nested.dot").is_file());

    std::fs::remove_dir_all(&graphs).unwrap();
    std::fs::write(&graphs, "").unwrap();
    let output = depgraph(&config, &["dot", "nested"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DOT output directory"), "got: {stderr}");
}

// ---------------------------------------------------------------------------
// CLI binary tests -- `depgraph rig`
// ---------------------------------------------------------------------------

#[test]
fn cli_rig_orders_all_operations() {
    let stdout = run_ok(&["rig", "--bones", "4", "--self-driver"]);
    assert!(stdout.contains("Failed relations: 0"), "got: {stdout}");
    assert!(stdout.contains("Cycles:           0"), "got: {stdout}");
    assert!(stdout.contains("Evaluation order:"));
    assert!(stdout.contains("OBRig/BONE(Bone3)/BONE_SEGMENTS"), "got: {stdout}");
}

#[test]
fn cli_rig_reports_cycle_as_json() {
    let stdout = run_ok(&["rig", "--cycle", "--json"]);
    let summary: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(summary["failed_relations"], 0);
    assert_eq!(summary["cycles"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        summary["order"].as_array().map(Vec::len),
        summary["operations"].as_u64().map(|n| n as usize)
    );
}

#[test]
fn cli_rig_ik_solver_runs_between_chain_and_result() {
    let stdout = run_ok(&["rig", "--bones", "4", "--ik", "2", "--json"]);
    let summary: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(summary["failed_relations"], 0);
    assert_eq!(summary["cycles"].as_array().map(Vec::len), Some(0));
    let order: Vec<&str> = summary["order"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    let position = |identifier: &str| order.iter().position(|op| *op == identifier).unwrap();
    let solver = position("OBRig/EVAL_POSE/POSE_IK_SOLVER(Bone2)");
    assert!(position("OBRig/BONE(Bone3)/BONE_READY") < solver);
    assert!(solver < position("OBRig/BONE(Bone2)/BONE_DONE"));
    assert!(position("OBTarget/TRANSFORM/TRANSFORM_FINAL") < solver);
}

#[test]
fn cli_rig_writes_dot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rig.dot");
    let output = depgraph(
        &dir.path().join("none.toml"),
        &["rig", "--cycle", "--dot", path.to_str().unwrap()],
    );
    assert!(output.status.success());
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("#e02020"), "cyclic relation should be highlighted");
}

// ---------------------------------------------------------------------------
// CLI binary tests -- `depgraph config`
// ---------------------------------------------------------------------------

#[test]
fn cli_config_show_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("depgraph.toml");
    std::fs::write(&path, "[executor]\nthreads = 3\n").unwrap();

    let output = depgraph(&path, &["config", "show"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("threads = 3"), "got: {stdout}");
    assert!(stdout.contains("filter = \"info\""), "got: {stdout}");
}

#[test]
fn cli_config_init_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("none.toml");
    let target = dir.path().join("new").join("config.toml");
    let target_arg = target.to_str().unwrap();

    assert!(depgraph(&config, &["config", "init", target_arg]).status.success());
    assert!(target.is_file());
    assert!(!depgraph(&config, &["config", "init", target_arg]).status.success());
    assert!(depgraph(&config, &["config", "init", target_arg, "--force"]).status.success());
}

#[test]
fn cli_config_validate_reports_bad_level() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[logging]\nfilter = \"depgraph_core=loud\"\n").unwrap();

    let output = depgraph(&dir.path().join("none.toml"), &["config", "validate", bad.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("loud"), "got: {stderr}");
}

#[test]
fn cli_help_lists_commands() {
    let stdout = run_ok(&["--help"]);
    for command in ["eval", "dot", "rig", "config"] {
        assert!(stdout.contains(command), "help should list '{command}'");
    }
}
