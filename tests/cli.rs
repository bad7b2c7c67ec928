//! CLI argument-validation test cases.

use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("intake-extractor").unwrap()
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn missing_positional_args_is_a_fatal_error() {
    cmd().assert().failure();
}

#[test]
fn unreadable_input_path_is_a_fatal_error() {
    cmd()
        .arg("tests/fixtures/does-not-exist.pdf")
        .arg("sk-fake-key")
        .arg("/tmp/intake-extractor-test-out.json")
        .assert()
        .failure();
}

#[test]
fn timeout_below_minimum_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.pdf");
    std::fs::write(&input, b"not a real pdf").unwrap();

    cmd()
        .arg(&input)
        .arg("sk-fake-key")
        .arg(dir.path().join("out.json"))
        .arg("--timeout=5")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--timeout"));
}

#[test]
fn max_lines_below_minimum_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.pdf");
    std::fs::write(&input, b"not a real pdf").unwrap();

    cmd()
        .arg(&input)
        .arg("sk-fake-key")
        .arg(dir.path().join("out.json"))
        .arg("--max-lines=1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--max-lines"));
}

#[test]
fn max_chars_below_minimum_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.pdf");
    std::fs::write(&input, b"not a real pdf").unwrap();

    cmd()
        .arg(&input)
        .arg("sk-fake-key")
        .arg(dir.path().join("out.json"))
        .arg("--max-chars=10")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--max-chars"));
}

#[test]
fn unsupported_single_file_input_is_a_fatal_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.docx");
    std::fs::write(&input, b"not a supported type").unwrap();

    cmd()
        .arg(&input)
        .arg("sk-fake-key")
        .arg(dir.path().join("out.json"))
        .assert()
        .failure();
}
