use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn init_writes_starter_config() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("studiod")
        .unwrap()
        .arg("init")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Created studiod.toml"));

    let content = std::fs::read_to_string(dir.path().join("studiod.toml")).unwrap();
    assert!(content.contains("[[service]]"));
    assert!(content.contains("name = \"backend\""));

    // Second run refuses to clobber the file.
    Command::cargo_bin("studiod")
        .unwrap()
        .arg("init")
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn status_without_config_fails_with_hint() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("studiod")
        .unwrap()
        .arg("status")
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("studiod init"));
}

#[test]
fn status_reports_not_running() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("studiod.toml"),
        "[[service]]\nname = 'backend'\ncommand = 'sleep 1'\nport = 5050\n",
    )
    .unwrap();

    Command::cargo_bin("studiod")
        .unwrap()
        .arg("status")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}
