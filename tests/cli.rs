// ABOUTME: Integration tests for the ergates CLI commands.
// ABOUTME: Validates --help output and dry-run rendering end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn ergates_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("ergates"))
}

#[test]
fn help_shows_commands() {
    ergates_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("deploy"));
}

#[test]
fn render_passes_plain_documents_through() {
    let temp_dir = tempfile::tempdir().unwrap();
    let template = temp_dir.path().join("plain.yaml");
    fs::write(&template, "key: value\n# comment\n").unwrap();

    ergates_cmd()
        .current_dir(temp_dir.path())
        .args(["render", "--template"])
        .arg(&template)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout("key: value\n# comment\n");
}

#[test]
fn render_writes_the_output_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let template = temp_dir.path().join("plain.yaml");
    let output = temp_dir.path().join("out.yaml");
    fs::write(&template, "key: value\n").unwrap();

    ergates_cmd()
        .current_dir(temp_dir.path())
        .args(["render", "--template"])
        .arg(&template)
        .arg("--dry-run")
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&output).unwrap(), "key: value\n");
}

#[test]
fn render_rejects_a_missing_template() {
    let temp_dir = tempfile::tempdir().unwrap();

    ergates_cmd()
        .current_dir(temp_dir.path())
        .args(["render", "--template", "missing.yaml", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("template not found"));
}
