//! CLI end-to-end tests.
//!
//! These tests spawn the actual `pyopt` binary and validate stdout and exit
//! codes.
//!
//! Exit code expectations:
//! - 0: Success
//! - 2: Invalid arguments
//! - 3: Input not found
//! - 6: Source does not parse

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use serde_json::Value;

/// Run pyopt with given arguments and return (stdout, stderr, exit_code).
fn run_pyopt(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_pyopt"))
        .args(args)
        .output()
        .expect("failed to execute pyopt");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code().unwrap_or(-1))
}

/// Run pyopt with `input` on stdin.
fn run_pyopt_stdin(args: &[&str], input: &str) -> (String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pyopt"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to execute pyopt");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait for pyopt");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

fn write_file(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, text).expect("write fixture");
    path.to_string_lossy().to_string()
}

const APPEND_LOOP: &str = "result = []\nfor x in range(10):\n    result.append(x * x)\n";

// ============================================================================
// analyze
// ============================================================================

#[test]
fn analyze_file_emits_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "loop.py", APPEND_LOOP);

    let (stdout, _stderr, exit_code) = run_pyopt(&["analyze", &path]);
    assert_eq!(exit_code, 0);

    let json: Value = serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["schema_version"], "1");
    let file = &json["files"][0];
    assert_eq!(file["complexity"]["time"], "O(n)");
    assert_eq!(file["complexity"]["space"], "O(n)");
    assert_eq!(file["findings"][0]["rule_id"], "append-in-loop");
    assert_eq!(file["findings"][0]["location"]["line"], 1);
    assert_eq!(
        file["findings"][0]["suggested_text"],
        "result = [x * x for x in range(10)]"
    );
}

#[test]
fn analyze_directory_is_sorted() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "b.py", "x = 1\n");
    write_file(dir.path(), "a.py", APPEND_LOOP);
    write_file(dir.path(), "readme.md", "# not python\n");

    let (stdout, _stderr, exit_code) = run_pyopt(&["analyze", dir.path().to_str().unwrap()]);
    assert_eq!(exit_code, 0);

    let json: Value = serde_json::from_str(&stdout).unwrap();
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[0]["path"].as_str().unwrap().ends_with("a.py"));
    assert!(files[1]["path"].as_str().unwrap().ends_with("b.py"));
}

#[test]
fn analyze_reads_stdin() {
    let (stdout, exit_code) = run_pyopt_stdin(&["analyze", "-", "--format", "text"], APPEND_LOOP);
    assert_eq!(exit_code, 0);
    assert!(stdout.contains("-: time O(n), space O(n)"), "{}", stdout);
    assert!(stdout.contains("[append-in-loop]"), "{}", stdout);
}

#[test]
fn parse_error_returns_exit_6() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "bad.py", "for x in range(10:\n    pass\n");

    let (stdout, _stderr, exit_code) = run_pyopt(&["analyze", &path]);
    assert_eq!(exit_code, 6);

    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"]["code"], 6);
    assert!(json["error"]["line"].as_u64().is_some());
    assert!(json["error"]["column"].as_u64().is_some());
    assert!(json["error"]["file"].as_str().unwrap().ends_with("bad.py"));
}

#[test]
fn missing_input_returns_exit_3() {
    let (stdout, _stderr, exit_code) = run_pyopt(&["analyze", "/no/such/dir/file.py"]);
    assert_eq!(exit_code, 3);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["error"]["code"], 3);
}

// ============================================================================
// refactor
// ============================================================================

#[test]
fn refactor_prints_rewritten_code() {
    let (stdout, exit_code) =
        run_pyopt_stdin(&["refactor", "-", "--format", "code"], APPEND_LOOP);
    assert_eq!(exit_code, 0);
    assert_eq!(stdout, "result = [x * x for x in range(10)]\n");
}

#[test]
fn refactor_json_reports_applied_rules() {
    let source = "s = \"\"\nfor w in [\"a\", \"b\", \"c\"]:\n    s += w\n";

    let (stdout, exit_code) = run_pyopt_stdin(&["refactor", "-"], source);
    assert_eq!(exit_code, 0);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["rewritten_text"], source);
    assert_eq!(json["applied_rule_ids"].as_array().unwrap().len(), 0);
    assert_eq!(json["formatted"], false);

    let (stdout, exit_code) = run_pyopt_stdin(
        &["refactor", "-", "--rule", "string-concat-in-loop"],
        source,
    );
    assert_eq!(exit_code, 0);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["applied_rule_ids"][0], "string-concat-in-loop");
    assert_eq!(
        json["rewritten_text"],
        "s = \"\".join(w for w in [\"a\", \"b\", \"c\"])\n"
    );
}

#[test]
fn refactor_write_updates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "loop.py", APPEND_LOOP);

    let (_stdout, _stderr, exit_code) = run_pyopt(&["refactor", &path, "--write"]);
    assert_eq!(exit_code, 0);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "result = [x * x for x in range(10)]\n"
    );
}

#[test]
fn refactor_write_output_is_canonical() {
    let dir = tempfile::tempdir().unwrap();
    let source = "# squares\nresult = []\n\nfor x in range(10):\n    result.append(x * x)\n";
    let path = write_file(dir.path(), "loop.py", source);

    let (_stdout, _stderr, exit_code) = run_pyopt(&["refactor", &path, "--write"]);
    assert_eq!(exit_code, 0);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "result = [x * x for x in range(10)]\n"
    );
}

#[test]
fn refactor_directory_returns_exit_2() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _stderr, exit_code) = run_pyopt(&["refactor", dir.path().to_str().unwrap()]);
    assert_eq!(exit_code, 2);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["status"], "error");
}

#[test]
fn missing_formatter_degrades_gracefully() {
    let (stdout, exit_code) = run_pyopt_stdin(
        &[
            "refactor",
            "-",
            "--formatter",
            "pyopt-no-such-formatter-xyz",
        ],
        APPEND_LOOP,
    );
    assert_eq!(exit_code, 0);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["formatted"], false);
    assert_eq!(json["rewritten_text"], "result = [x * x for x in range(10)]\n");
}

// ============================================================================
// rules
// ============================================================================

#[test]
fn rules_lists_table() {
    let (stdout, _stderr, exit_code) = run_pyopt(&["rules"]);
    assert_eq!(exit_code, 0);
    let json: Value = serde_json::from_str(&stdout).unwrap();
    let rules = json["rules"].as_array().unwrap();
    assert_eq!(rules.len(), 7);
    assert_eq!(rules[0]["id"], "append-in-loop");
    assert_eq!(rules[0]["auto_apply"], "default");
    assert_eq!(rules[2]["auto_apply"], "never");
}

#[test]
fn unknown_subcommand_returns_exit_2() {
    let (_stdout, _stderr, exit_code) = run_pyopt(&["frobnicate"]);
    assert_eq!(exit_code, 2);
}
