// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Integration tests for the ragraph CLI commands

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

/// Build a ragraph command isolated to `data_dir`
fn ragraph(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ragraph").expect("ragraph binary");
    cmd.env("RAGRAPH_DATA_DIR", data_dir.path())
        .env("XDG_CONFIG_HOME", data_dir.path().join("config"))
        .env_remove("RAGRAPH_CONFIG")
        .env_remove("RAGRAPH_POLICY")
        .env_remove("RAGRAPH_MAX_CYCLES")
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "error");
    cmd
}

/// Run ragraph with the given arguments and data directory
fn run_ragraph(data_dir: &TempDir, args: &[&str]) -> std::process::Output {
    ragraph(data_dir)
        .args(args)
        .output()
        .expect("Failed to execute ragraph")
}

/// Helper to get stdout as string
fn stdout_str(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Helper to get stderr as string
fn stderr_str(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Assert command succeeded
fn assert_success(output: &std::process::Output, context: &str) {
    if !output.status.success() {
        eprintln!("Command failed: {}", context);
        eprintln!("STDOUT: {}", stdout_str(output));
        eprintln!("STDERR: {}", stderr_str(output));
        panic!("Command failed: {}", context);
    }
}

/// Two processes, two single-unit resources, each process holding one
fn setup_half_deadlock(data_dir: &TempDir) {
    for args in [
        &["process", "add", "editor"][..],
        &["process", "add", "spooler"],
        &["resource", "add", "printer", "--units", "1"],
        &["resource", "add", "disk", "--units", "1"],
        &["allocate", "editor", "printer"],
        &["allocate", "spooler", "disk"],
        &["request", "editor", "disk"],
    ] {
        let output = run_ragraph(data_dir, args);
        assert_success(&output, &args.join(" "));
    }
}

#[test]
fn test_empty_state_lists() {
    let data_dir = TempDir::new().unwrap();

    let output = run_ragraph(&data_dir, &["process", "list"]);
    assert_success(&output, "process list");
    assert!(stdout_str(&output).contains("No processes defined"));

    let output = run_ragraph(&data_dir, &["resource", "list"]);
    assert_success(&output, "resource list");
    assert!(stdout_str(&output).contains("No resources defined"));
}

#[test]
fn test_deadlock_lifecycle() {
    let data_dir = TempDir::new().unwrap();
    setup_half_deadlock(&data_dir);

    let output = run_ragraph(&data_dir, &["check"]);
    assert_success(&output, "check before circular wait");
    assert!(stdout_str(&output).contains("No deadlock"));

    // close the circle
    let output = run_ragraph(&data_dir, &["request", "spooler", "printer"]);
    assert_success(&output, "request spooler printer");

    let output = run_ragraph(&data_dir, &["check"]);
    assert_success(&output, "check after circular wait");
    let stdout = stdout_str(&output);
    assert!(stdout.contains("DEADLOCK"));
    assert!(stdout.contains("affected processes: editor, spooler") || stdout.contains("affected processes: spooler, editor"));

    ragraph(&data_dir)
        .args(["check", "--fail-on-deadlock"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("deadlock detected"));

    // breaking the hold resolves it
    let output = run_ragraph(&data_dir, &["release", "spooler", "disk"]);
    assert_success(&output, "release spooler disk");

    ragraph(&data_dir)
        .args(["check", "--fail-on-deadlock"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cycles detected."));
}

#[test]
fn test_check_json_output() {
    let data_dir = TempDir::new().unwrap();
    setup_half_deadlock(&data_dir);
    assert_success(&run_ragraph(&data_dir, &["request", "spooler", "printer"]), "request");

    let output = run_ragraph(&data_dir, &["--json", "check"]);
    assert_success(&output, "check --json");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["has_deadlock"], true);
    assert_eq!(report["affected_processes"].as_array().unwrap().len(), 2);
    assert_eq!(report["cycle"].as_array().unwrap().len(), 5);
}

#[test]
fn test_check_file_mapping_and_document() {
    let data_dir = TempDir::new().unwrap();

    let mapping = data_dir.path().join("mapping.json");
    std::fs::write(&mapping, r#"{"A": ["B"], "B": ["C"], "C": ["A"]}"#).unwrap();
    ragraph(&data_dir)
        .args(["check", "--file"])
        .arg(&mapping)
        .assert()
        .success()
        .stdout(predicate::str::contains("cycle: A -> B -> C -> A"));

    let document = data_dir.path().join("graph.json");
    std::fs::write(
        &document,
        r#"{
            "nodes": [
                {"id": "p1", "type": "process", "label": "shell"},
                {"id": "p2", "type": "process", "label": "daemon"}
            ],
            "edges": [
                {"from": "p1", "to": "p2", "type": "request"},
                {"from": "p2", "to": "p1", "type": "request"}
            ]
        }"#,
    )
    .unwrap();

    ragraph(&data_dir)
        .args(["check", "--file"])
        .arg(&document)
        .assert()
        .success()
        .stdout(predicate::str::contains("shell -> daemon -> shell"));

    // no process/resource alternation, so the strict policy finds nothing
    ragraph(&data_dir)
        .args(["check", "--policy", "alternating", "--file"])
        .arg(&document)
        .assert()
        .success()
        .stdout(predicate::str::contains("No deadlock"));
}

#[test]
fn test_check_stdin_and_invalid_input() {
    let data_dir = TempDir::new().unwrap();

    assert_cmd::Command::from_std(ragraph(&data_dir))
        .args(["check", "--file", "-"])
        .write_stdin(r#"{"A": ["A"]}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("A -> A"));

    assert_cmd::Command::from_std(ragraph(&data_dir))
        .args(["check", "--file", "-"])
        .write_stdin("[1, 2, 3]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid input"));
}

#[test]
fn test_allocation_errors_are_reported() {
    let data_dir = TempDir::new().unwrap();
    setup_half_deadlock(&data_dir);

    let output = run_ragraph(&data_dir, &["allocate", "spooler", "printer"]);
    assert!(!output.status.success());
    assert!(stderr_str(&output).contains("not enough units available"));

    let output = run_ragraph(&data_dir, &["resource", "delete", "printer"]);
    assert!(!output.status.success());
    assert!(stderr_str(&output).contains("while it is allocated"));

    let output = run_ragraph(&data_dir, &["cancel", "spooler", "printer"]);
    assert!(!output.status.success());
    assert!(stderr_str(&output).contains("no pending request"));

    let output = run_ragraph(&data_dir, &["resource", "add", "tape", "--units", "0"]);
    assert!(!output.status.success());
}

#[test]
fn test_remove_process_frees_resources() {
    let data_dir = TempDir::new().unwrap();
    setup_half_deadlock(&data_dir);

    let output = run_ragraph(&data_dir, &["process", "remove", "editor"]);
    assert_success(&output, "process remove editor");

    let output = run_ragraph(&data_dir, &["resource", "list"]);
    assert_success(&output, "resource list");
    assert!(stdout_str(&output).contains("printer"));
    assert!(stdout_str(&output).contains("1/1 available"));
}

#[test]
fn test_graph_export() {
    let data_dir = TempDir::new().unwrap();
    setup_half_deadlock(&data_dir);

    let output = run_ragraph(&data_dir, &["graph"]);
    assert_success(&output, "graph");
    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 4);
    assert_eq!(graph["edges"].as_array().unwrap().len(), 3);
    assert_eq!(graph["stats"]["requests"], 1);

    assert_success(&run_ragraph(&data_dir, &["request", "spooler", "printer"]), "request");

    let out_file = data_dir.path().join("graph.dot");
    let output = run_ragraph(
        &data_dir,
        &["graph", "--format", "dot", "--output", out_file.to_str().unwrap()],
    );
    assert_success(&output, "graph --format dot");
    assert!(stdout_str(&output).contains("Exported to"));

    let dot = std::fs::read_to_string(&out_file).unwrap();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("color=red"));
}

#[test]
fn test_zero_cycle_cap_keeps_verdict_and_highlight() {
    let data_dir = TempDir::new().unwrap();
    setup_half_deadlock(&data_dir);
    assert_success(&run_ragraph(&data_dir, &["request", "spooler", "printer"]), "request");

    for policy in ["any-cycle", "alternating"] {
        ragraph(&data_dir)
            .args(["check", "--max-cycles", "0", "--policy", policy, "--fail-on-deadlock"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("deadlock detected"));
    }

    let output = ragraph(&data_dir)
        .env("RAGRAPH_MAX_CYCLES", "0")
        .args(["graph", "--format", "dot"])
        .output()
        .unwrap();
    assert_success(&output, "graph --format dot with zero cap");
    assert_eq!(stdout_str(&output).matches("color=red").count(), 8);
}

#[test]
fn test_usage_report() {
    let data_dir = TempDir::new().unwrap();
    setup_half_deadlock(&data_dir);
    assert_success(&run_ragraph(&data_dir, &["release", "spooler", "disk"]), "release");

    let output = run_ragraph(&data_dir, &["usage"]);
    assert_success(&output, "usage");
    let stdout = stdout_str(&output);
    assert!(stdout.contains("printer"));
    assert!(stdout.contains("1/1 units in use (100.0%)"));
    assert!(stdout.contains("Total allocations: 1, total requests: 1"));

    let output = run_ragraph(&data_dir, &["--json", "usage"]);
    assert_success(&output, "usage --json");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let resources = report["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[1]["name"], "disk");
    assert_eq!(resources[1]["current_usage"], 0);
    assert!(resources[1]["average_hold_seconds"].is_number());
    assert!(resources[0]["average_hold_seconds"].is_null());
    assert_eq!(report["trend"].as_array().unwrap().len(), 4);
}

#[test]
fn test_reset_clears_state() {
    let data_dir = TempDir::new().unwrap();
    setup_half_deadlock(&data_dir);

    assert_success(&run_ragraph(&data_dir, &["reset"]), "reset");

    let output = run_ragraph(&data_dir, &["--json", "process", "list"]);
    assert_success(&output, "process list --json");
    let list: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(list.as_array().unwrap().is_empty());
}

#[test]
fn test_config_show() {
    let data_dir = TempDir::new().unwrap();

    ragraph(&data_dir)
        .args(["config", "policy"])
        .assert()
        .success()
        .stdout("any-cycle\n");

    ragraph(&data_dir)
        .env("RAGRAPH_POLICY", "alternating")
        .args(["config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("policy = \"alternating\""));
}

#[test]
fn test_completions() {
    let data_dir = TempDir::new().unwrap();

    ragraph(&data_dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ragraph"));
}
