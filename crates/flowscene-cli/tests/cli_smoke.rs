use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn repo_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .to_path_buf()
}

fn fixture(name: &str) -> PathBuf {
    let path = repo_root().join("fixtures").join("flowchart").join(name);
    assert!(path.exists(), "fixture missing: {}", path.display());
    path
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn cli_extract_prints_logical_graph() {
    let exe = assert_cmd::cargo_bin!("flowscene");
    let assert = Command::new(exe)
        .args(["extract", fixture("browser_vm.mmd").to_string_lossy().as_ref()])
        .assert()
        .success();

    let graph = stdout_json(assert.get_output());
    assert_eq!(graph["direction"], "LR");
    assert_eq!(graph["nodes"][0]["id"], "B");
    assert_eq!(graph["nodes"][0]["label"], "Browser https://example.com");
    assert_eq!(graph["nodes"][1]["id"], "VM");
    assert_eq!(graph["edges"][0]["label"], "request");
    assert_eq!(graph["classDefs"]["VM"], "fill:#333,stroke:#ccc");
}

#[test]
fn cli_reconciles_against_prerendered_svg() {
    let exe = assert_cmd::cargo_bin!("flowscene");
    let assert = Command::new(exe)
        .args([
            "--pretty",
            "--svg",
            fixture("browser_vm.svg").to_string_lossy().as_ref(),
            fixture("browser_vm.mmd").to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let scene = stdout_json(assert.get_output());
    assert_eq!(scene["nodes"][0]["visualId"], "flowchart-B-0");
    assert_eq!(scene["nodes"][0]["bbox"]["width"], 256.0);
    assert_eq!(scene["nodes"][1]["className"], "VM");
    assert_eq!(scene["edges"][0]["fromId"], "flowchart-B-0");
    assert_eq!(scene["edges"][0]["x2"], 336.5);
}

#[test]
fn cli_visual_dumps_rendered_tree() {
    let exe = assert_cmd::cargo_bin!("flowscene");
    let assert = Command::new(exe)
        .args([
            "visual",
            "--svg",
            fixture("pipeline.svg").to_string_lossy().as_ref(),
            fixture("pipeline.mmd").to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let tree = stdout_json(assert.get_output());
    assert_eq!(tree["nodes"].as_array().map(Vec::len), Some(3));
    assert_eq!(tree["edges"].as_array().map(Vec::len), Some(4));
}

#[test]
fn cli_rejects_blank_input() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let blank = tmp.path().join("blank.mmd");
    fs::write(&blank, "  \n\n").expect("write blank fixture");

    let exe = assert_cmd::cargo_bin!("flowscene");
    let output = Command::new(exe)
        .args(["extract", blank.to_string_lossy().as_ref()])
        .output()
        .expect("run flowscene");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No Mermaid code provided"));
    assert!(output.stdout.is_empty());
}

#[test]
fn cli_usage_errors_exit_2() {
    let exe = assert_cmd::cargo_bin!("flowscene");
    let output = Command::new(exe)
        .args(["--no-such-flag"])
        .output()
        .expect("run flowscene");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("USAGE:"));
}

#[test]
fn cli_reports_unreadable_svg() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let svg = tmp.path().join("broken.svg");
    fs::write(&svg, "<svg").expect("write broken svg");

    let exe = assert_cmd::cargo_bin!("flowscene");
    let output = Command::new(exe)
        .args([
            "--svg",
            svg.to_string_lossy().as_ref(),
            fixture("browser_vm.mmd").to_string_lossy().as_ref(),
        ])
        .output()
        .expect("run flowscene");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unreadable output"));
}
