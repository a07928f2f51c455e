// ABOUTME: Integration tests for the commandcast CLI.
// ABOUTME: Validates --help output, flag validation and credential failures.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture_key() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/id_ed25519")
}

/// A command isolated from the caller's agent, keys and settings.
fn commandcast_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("commandcast"));
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("SSH_AUTH_SOCK")
        .env_remove("COMMANDCAST_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_shows_commands() {
    let home = tempfile::tempdir().unwrap();
    commandcast_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("exec"));
}

#[test]
fn exec_help_lists_host_flags() {
    let home = tempfile::tempdir().unwrap();
    commandcast_cmd(&home)
        .args(["exec", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--hostfile"))
        .stdout(predicate::str::contains("--interactive"))
        .stdout(predicate::str::contains("--timeout"));
}

#[test]
fn fails_without_any_credentials() {
    let home = tempfile::tempdir().unwrap();
    commandcast_cmd(&home)
        .args(["exec", "--hosts", "a.example.com", "uptime"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no usable authentication method"));
}

#[test]
fn json_mode_reports_errors_as_events() {
    let home = tempfile::tempdir().unwrap();
    commandcast_cmd(&home)
        .args(["--json", "exec", "uptime"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""event":"error""#))
        .stdout(predicate::str::contains("no usable authentication method"));
}

#[test]
fn zero_timeout_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    commandcast_cmd(&home)
        .args(["exec", "--timeout", "0", "uptime"])
        .assert()
        .failure();
}

#[test]
fn quiet_and_json_conflict() {
    let home = tempfile::tempdir().unwrap();
    commandcast_cmd(&home)
        .args(["--quiet", "--json", "exec", "uptime"])
        .assert()
        .failure();
}

#[test]
fn explicit_missing_config_fails() {
    let home = tempfile::tempdir().unwrap();
    commandcast_cmd(&home)
        .args(["--config", "missing.yml", "exec", "uptime"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn no_valid_hosts_is_a_warning_not_an_error() {
    let home = tempfile::tempdir().unwrap();
    commandcast_cmd(&home)
        .args(["exec", "--keys"])
        .arg(fixture_key())
        .args(["--hosts", "bad token with spaces", "uptime"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Keys:"))
        .stderr(predicate::str::contains("no valid hosts"));
}

#[test]
fn settings_file_supplies_keys_and_hosts() {
    let home = tempfile::tempdir().unwrap();
    let settings = format!(
        "keys:\n  - {}\nhosts:\n  - 'not a host'\n",
        fixture_key().display()
    );
    std::fs::write(home.path().join("commandcast.yml"), settings).unwrap();

    commandcast_cmd(&home)
        .args(["exec", "uptime"])
        .assert()
        .success()
        .stderr(predicate::str::contains("no valid hosts"));
}
