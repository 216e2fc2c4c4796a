use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command running in an empty directory so no stray `config.toml` is read.
fn comparesync(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("comparesync").expect("binary built");
    cmd.current_dir(dir.path()).env_remove("COMPARESYNC_TOKEN");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    comparesync(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sets"))
        .stdout(predicate::str::contains("compare"));
}

#[test]
fn mock_backend_lists_seeded_set() {
    let dir = TempDir::new().unwrap();
    comparesync(&dir)
        .args(["--mock", "sets", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Semiconductors"));
}

#[test]
fn json_output_is_one_object_per_line() {
    let dir = TempDir::new().unwrap();
    let output = comparesync(&dir)
        .args(["--mock", "--json", "sets", "show", "1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let line = stdout.lines().next().expect("one json line");
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(value["type"], "set");
    assert_eq!(value["payload"]["members"].as_array().map(Vec::len), Some(2));
}

#[test]
fn compare_prints_every_member() {
    let dir = TempDir::new().unwrap();
    comparesync(&dir)
        .args(["--mock", "compare", "1", "--range", "3M"])
        .assert()
        .success()
        .stdout(predicate::str::contains("005930"))
        .stdout(predicate::str::contains("000660"));
}

#[test]
fn prices_accepts_lowercase_range() {
    let dir = TempDir::new().unwrap();
    comparesync(&dir)
        .args(["--mock", "prices", "035420", "--range", "1y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1wk"));
}

#[test]
fn blank_set_name_fails() {
    let dir = TempDir::new().unwrap();
    comparesync(&dir)
        .args(["--mock", "sets", "create", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("name"));
}

#[test]
fn user_sets_require_token_without_mock() {
    let dir = TempDir::new().unwrap();
    comparesync(&dir)
        .args(["sets", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("COMPARESYNC_TOKEN"));
}

#[test]
fn config_validate_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[retry]\nbackoff_multiplier = 0.5").unwrap();

    comparesync(&dir)
        .args(["config", "validate", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("backoff_multiplier"));
}

#[test]
fn config_validate_accepts_defaults() {
    let dir = TempDir::new().unwrap();
    comparesync(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}
