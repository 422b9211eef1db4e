//! Smoke tests for the simtap binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("simtap")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("click"))
        .stdout(predicate::str::contains("screenshot"))
        .stdout(predicate::str::contains("get-state"));
}

#[test]
fn missing_subcommand_fails() {
    Command::cargo_bin("simtap").unwrap().assert().failure();
}

#[test]
fn click_fails_when_nothing_listening() {
    Command::cargo_bin("simtap")
        .unwrap()
        .args(["--port", "19991", "click", "btn_heart"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn config_path_prints_a_path() {
    Command::cargo_bin("simtap")
        .unwrap()
        .arg("config-path")
        .assert()
        .success()
        .stdout(predicate::str::contains("config.json"));
}
