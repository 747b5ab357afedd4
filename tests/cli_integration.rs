//! Integration tests for the openwrite CLI
//!
//! These tests exercise the full CLI workflow using a temporary database.
//! They verify that commands work end-to-end without mocking.

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run openwrite CLI with a specific database path
fn run_openwrite(args: &[&str], db_path: &PathBuf) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_openwrite"))
        .args(args)
        .env("OPENWRITE_DB_PATH", db_path)
        .output()
        .expect("Failed to execute openwrite")
}

/// Helper to get stdout as string
fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Helper to get stderr as string
fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn temp_db() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("openwrite.db");
    (dir, path)
}

/// Extract the first integer that follows a marker word in CLI output,
/// e.g. "Created project 3 (My Novel)" -> 3
fn id_after(out: &str, marker: &str) -> i32 {
    let rest = out
        .split(marker)
        .nth(1)
        .unwrap_or_else(|| panic!("no '{}' in output: {}", marker, out));
    rest.split_whitespace()
        .next()
        .and_then(|s| s.trim_end_matches(':').parse().ok())
        .unwrap_or_else(|| panic!("no id after '{}' in output: {}", marker, out))
}

// =============================================================================
// Basic Command Tests
// =============================================================================

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_openwrite"))
        .arg("--help")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("openwrite"));
    assert!(out.contains("Story graph"));
}

#[test]
fn test_version_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_openwrite"))
        .arg("--version")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("openwrite"));
}

// =============================================================================
// Shell Completion Tests
// =============================================================================

#[test]
fn test_completion_zsh() {
    let output = Command::new(env!("CARGO_BIN_EXE_openwrite"))
        .args(["completion", "zsh"])
        .output()
        .expect("Failed to execute");

    assert!(
        output.status.success(),
        "completion zsh failed: {}",
        stderr(&output)
    );
    let out = stdout(&output);
    assert!(
        out.contains("#compdef openwrite"),
        "zsh completion should contain #compdef"
    );
}

#[test]
fn test_completion_bash() {
    let output = Command::new(env!("CARGO_BIN_EXE_openwrite"))
        .args(["completion", "bash"])
        .output()
        .expect("Failed to execute");

    assert!(
        output.status.success(),
        "completion bash failed: {}",
        stderr(&output)
    );
    let out = stdout(&output);
    assert!(
        out.contains("_openwrite"),
        "bash completion should contain _openwrite function"
    );
}

// =============================================================================
// Project Workflow Tests
// =============================================================================

#[test]
fn test_project_create_and_list() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["project", "new", "The Long Night"], &db);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Created"));

    let output = run_openwrite(&["projects"], &db);
    assert!(output.status.success());
    assert!(stdout(&output).contains("The Long Night"));
}

#[test]
fn test_project_delete() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["project", "new", "Doomed"], &db);
    let id = id_after(&stdout(&output), "project");

    let output = run_openwrite(&["project", "rm", &id.to_string()], &db);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = run_openwrite(&["projects"], &db);
    assert!(!stdout(&output).contains("Doomed"));
}

#[test]
fn test_delete_missing_project_fails() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["project", "rm", "999"], &db);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("does not exist"));
}

// =============================================================================
// Node and Connection Workflow Tests
// =============================================================================

#[test]
fn test_node_add_and_list() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["project", "new", "P"], &db);
    let pid = id_after(&stdout(&output), "project").to_string();

    let output = run_openwrite(&["node", "add", &pid, "character", "Maeve"], &db);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = run_openwrite(
        &["node", "add", &pid, "story_element", "Opening", "--subtype", "scene"],
        &db,
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let output = run_openwrite(&["nodes", &pid], &db);
    let out = stdout(&output);
    assert!(out.contains("Maeve"));
    assert!(out.contains("Opening"));
    assert!(out.contains("scene"));

    // Type filter narrows the listing
    let output = run_openwrite(&["nodes", &pid, "-t", "character"], &db);
    let out = stdout(&output);
    assert!(out.contains("Maeve"));
    assert!(!out.contains("Opening"));
}

#[test]
fn test_invalid_node_type_rejected() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["project", "new", "P"], &db);
    let pid = id_after(&stdout(&output), "project").to_string();

    let output = run_openwrite(&["node", "add", &pid, "villain", "Bad"], &db);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("node type"));
}

#[test]
fn test_connect_nodes() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["project", "new", "P"], &db);
    let pid = id_after(&stdout(&output), "project").to_string();

    let output = run_openwrite(&["node", "add", &pid, "character", "Maeve"], &db);
    let from = id_after(&stdout(&output), "node");
    let output = run_openwrite(&["node", "add", &pid, "plot_thread", "Revenge"], &db);
    let to = id_after(&stdout(&output), "node");

    let output = run_openwrite(
        &[
            "connect",
            &from.to_string(),
            &to.to_string(),
            "-t",
            "character_arc",
            "-s",
            "4",
        ],
        &db,
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("character_arc"));
}

#[test]
fn test_connect_rejects_bad_strength() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["project", "new", "P"], &db);
    let pid = id_after(&stdout(&output), "project").to_string();

    let output = run_openwrite(&["node", "add", &pid, "character", "A"], &db);
    let from = id_after(&stdout(&output), "node");
    let output = run_openwrite(&["node", "add", &pid, "character", "B"], &db);
    let to = id_after(&stdout(&output), "node");

    let output = run_openwrite(
        &["connect", &from.to_string(), &to.to_string(), "-s", "9"],
        &db,
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Strength"));
}

// =============================================================================
// Text Block Workflow Tests
// =============================================================================

#[test]
fn test_block_add_and_list() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["project", "new", "P"], &db);
    let pid = id_after(&stdout(&output), "project").to_string();

    let output = run_openwrite(
        &["node", "add", &pid, "story_element", "Scene", "--subtype", "scene"],
        &db,
    );
    let nid = id_after(&stdout(&output), "node").to_string();

    let output = run_openwrite(
        &["block", "add", &nid, "It was a dark and stormy night.", "-i", "1"],
        &db,
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("7 words"));

    let output = run_openwrite(&["blocks", &nid], &db);
    assert!(stdout(&output).contains("stormy night"));

    // Word count rolls up to the node listing
    let output = run_openwrite(&["nodes", &pid], &db);
    assert!(stdout(&output).contains('7'));
}

#[test]
fn test_block_rejected_on_non_story_element() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["project", "new", "P"], &db);
    let pid = id_after(&stdout(&output), "project").to_string();

    let output = run_openwrite(&["node", "add", &pid, "character", "Maeve"], &db);
    let nid = id_after(&stdout(&output), "node").to_string();

    let output = run_openwrite(&["block", "add", &nid, "prose"], &db);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("story_element"));
}

// =============================================================================
// Export Tests
// =============================================================================

#[test]
fn test_dot_export() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["project", "new", "P"], &db);
    let pid = id_after(&stdout(&output), "project").to_string();

    let output = run_openwrite(&["node", "add", &pid, "character", "Maeve"], &db);
    let from = id_after(&stdout(&output), "node");
    let output = run_openwrite(&["node", "add", &pid, "location", "The Spire"], &db);
    let to = id_after(&stdout(&output), "node");
    run_openwrite(
        &["connect", &from.to_string(), &to.to_string(), "-t", "setting"],
        &db,
    );

    let output = run_openwrite(&["dot", &pid], &db);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("digraph StoryGraph"));
    assert!(out.contains("Maeve"));
    assert!(out.contains(&format!("{} -> {}", from, to)));
}

#[test]
fn test_dot_export_to_file() {
    let (dir, db) = temp_db();

    let output = run_openwrite(&["project", "new", "P"], &db);
    let pid = id_after(&stdout(&output), "project").to_string();
    run_openwrite(&["node", "add", &pid, "lore", "The Sundering"], &db);

    let out_path = dir.path().join("graph.dot");
    let output = run_openwrite(&["dot", &pid, "-o", out_path.to_str().unwrap()], &db);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let contents = std::fs::read_to_string(&out_path).unwrap();
    assert!(contents.contains("The Sundering"));
}

#[test]
fn test_dot_missing_project_fails() {
    let (_dir, db) = temp_db();

    let output = run_openwrite(&["dot", "42"], &db);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("does not exist"));
}
