//! Black-box integration tests: invoke the compiled `code-graph` binary against
//! synthetic TypeScript fixture projects written to a tempdir. Each test mirrors one
//! of the end-to-end scenarios the query resolver and sync pipeline are built around.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_code-graph"))
}

fn run(args: &[&str]) -> (bool, String, String) {
    let out = Command::new(binary()).args(args).output().expect("failed to invoke code-graph binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    (out.status.success(), stdout, stderr)
}

fn run_success(args: &[&str]) -> String {
    let (ok, stdout, stderr) = run(args);
    assert!(ok, "command {:?} failed\nstdout: {stdout}\nstderr: {stderr}", args);
    stdout
}

// ---------------------------------------------------------------------------
// Scenario 1: transparent barrel re-export
// ---------------------------------------------------------------------------

#[test]
fn transparent_barrel_resolves_the_terminal_declaration() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::write(root.join("a.ts"), "export const formatValue = (v: number) => v.toFixed(2);\n").unwrap();
    fs::create_dir_all(root.join("utils")).unwrap();
    fs::write(root.join("utils/index.ts"), "export { formatValue } from '../a';\n").unwrap();
    fs::write(
        root.join("consumer.ts"),
        "import { formatValue } from './utils';\nexport const show = (n: number) => formatValue(n);\n",
    )
    .unwrap();

    let path = root.to_str().unwrap();
    run_success(&["index", path]);

    let stdout = run_success(&["query", path, "--from", "show", "--format", "compact"]);
    assert!(stdout.contains("formatValue"), "expected formatValue reachable from show\n{stdout}");
    assert!(!stdout.contains("utils/index.ts"), "barrel file must never appear as a node\n{stdout}");
}

// ---------------------------------------------------------------------------
// Scenario 5: path-finding with truncation
// ---------------------------------------------------------------------------

#[test]
fn path_finding_truncates_to_max_nodes_along_the_unique_chain() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::write(
        root.join("chain.ts"),
        "export function a() { return b(); }\n\
         export function b() { return c(); }\n\
         export function c() { return d(); }\n\
         export function d() { return e(); }\n\
         export function e() { return f(); }\n\
         export function f() { return 0; }\n",
    )
    .unwrap();

    let path = root.to_str().unwrap();
    run_success(&["index", path]);

    let stdout = run_success(&["query", path, "--from", "a", "--to", "f", "--max-nodes", "3", "--format", "json"]);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("query --format json should be valid JSON");

    assert_eq!(value["truncated"], serde_json::Value::Bool(true));
    let nodes = value["nodes"].as_array().expect("nodes array");
    assert_eq!(nodes.len(), 3, "expected exactly 3 kept nodes on the truncated chain\n{stdout}");

    let names: Vec<&str> = nodes.iter().map(|n| n["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

// ---------------------------------------------------------------------------
// Scenario 6: auto-resolution of a single-method class
// ---------------------------------------------------------------------------

#[test]
fn single_method_class_auto_routes_to_its_sole_method() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::write(
        root.join("user_service.ts"),
        "export class UserService {\n  save(): void {}\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("controller.ts"),
        "import { UserService } from './user_service';\n\
         export function handle() { new UserService().save(); }\n",
    )
    .unwrap();

    let path = root.to_str().unwrap();
    run_success(&["index", path]);

    let stdout = run_success(&["query", path, "--to", "UserService", "--format", "compact"]);
    assert!(
        stdout.contains("Resolved 'UserService' to UserService.save"),
        "expected auto-resolution message\n{stdout}"
    );
}

// ---------------------------------------------------------------------------
// Ambient-stack behavior
// ---------------------------------------------------------------------------

#[test]
fn query_with_every_endpoint_absent_is_a_resolution_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("a.ts"), "export const x = 1;\n").unwrap();

    let path = root.to_str().unwrap();
    run_success(&["index", path]);

    let (ok, _stdout, stderr) = run(&["query", path]);
    assert!(!ok, "query with no endpoints should fail");
    assert!(stderr.to_lowercase().contains("no such symbol") || stderr.to_lowercase().contains("resolution"));
}

#[test]
fn query_for_an_unknown_symbol_reports_resolution_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("a.ts"), "export const x = 1;\n").unwrap();

    let path = root.to_str().unwrap();
    run_success(&["index", path]);

    let (ok, _stdout, stderr) = run(&["query", path, "--from", "totallyUnknownSymbol"]);
    assert!(!ok);
    assert!(stderr.contains("totallyUnknownSymbol"));
}

#[test]
fn malformed_config_falls_back_to_defaults_instead_of_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("a.ts"), "export const x = 1;\n").unwrap();
    fs::write(root.join("code-graph.toml"), "this is not valid toml {{{\n").unwrap();

    let path = root.to_str().unwrap();
    // Must not abort despite the malformed config file.
    run_success(&["index", path]);
}

#[test]
fn stats_reports_node_and_file_counts() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("a.ts"), "export function one() { return 1; }\nexport function two() { return 2; }\n").unwrap();

    let path = root.to_str().unwrap();
    run_success(&["index", path]);

    let stdout = run_success(&["stats", path, "--format", "json"]);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("stats --format json should be valid JSON");
    assert_eq!(value["file_count"], serde_json::json!(1));
    assert!(value["node_count"].as_u64().unwrap() >= 2);
}

#[test]
fn export_writes_json_graph_to_the_given_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("a.ts"), "export function one() { return 1; }\n").unwrap();

    let path = root.to_str().unwrap();
    run_success(&["index", path]);

    let out_file = root.join("graph.json");
    run_success(&["export", path, "--output", out_file.to_str().unwrap()]);

    let contents = fs::read_to_string(&out_file).unwrap();
    let value: serde_json::Value = serde_json::from_str(&contents).expect("export output should be valid JSON");
    assert!(value["nodes"].as_array().unwrap().iter().any(|n| n["name"] == "one"));
}
