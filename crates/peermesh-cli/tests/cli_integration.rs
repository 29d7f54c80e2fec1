//! CLI Integration Tests
//!
//! These tests run the `peermesh` binary end-to-end. Everything here stays
//! off the network: `simulate` uses the in-process transport and `serve`
//! is only exercised up to configuration errors.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

fn cli_cmd() -> Command {
    Command::cargo_bin("peermesh").expect("Failed to find peermesh binary")
}

// ============================================================================
// Help
// ============================================================================

#[test]
fn test_help_lists_commands() {
    cli_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("simulate"));
}

#[test]
fn test_serve_help_lists_signaling_flags() {
    cli_cmd()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--signal-host"))
        .stdout(predicate::str::contains("--signal-port"))
        .stdout(predicate::str::contains("--connect"));
}

// ============================================================================
// Simulate Command Tests
// ============================================================================

#[test]
fn test_simulate_converges() {
    cli_cmd()
        .args(["simulate", "--peers", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mesh converged: 4 peers"))
        .stdout(predicate::str::contains("leader"))
        .stdout(predicate::str::contains("follower"))
        .stdout(predicate::str::contains("peers=3"));
}

#[test]
fn test_simulate_delivers_message() {
    cli_cmd()
        .args(["simulate", "--peers", "3", "--message", "hello mesh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Message from peer-2 delivered to every peer"));
}

#[test]
fn test_simulate_json_output() {
    let output = cli_cmd()
        .args(["simulate", "--peers", "2", "--message", "hi", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let snapshots: Vec<serde_json::Value> = stdout
        .lines()
        .filter(|line| line.starts_with('{'))
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0]["role"], "leader");
    assert_eq!(snapshots[1]["role"], "follower");
    assert_eq!(snapshots[0]["messages"][0]["body"], "hi");
    assert_eq!(snapshots[0]["messages"][0]["from"], "peer-1");
}

#[test]
fn test_simulate_needs_two_peers() {
    cli_cmd()
        .args(["simulate", "--peers", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 2 peers"));
}

// ============================================================================
// Serve Configuration Errors
// ============================================================================

#[test]
fn test_serve_rejects_port_zero() {
    cli_cmd()
        .args(["serve", "--signal-host", "localhost", "--signal-port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("signaling port"));
}

#[test]
fn test_serve_rejects_missing_config_file() {
    let dir = TempDir::new().unwrap();
    cli_cmd()
        .args(["serve", "--config"])
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_serve_rejects_bad_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mesh.json");
    std::fs::write(&path, r#"{"signaling": {"host": "https://relay", "port": 443}}"#).unwrap();

    cli_cmd()
        .args(["serve", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("scheme"));
}
