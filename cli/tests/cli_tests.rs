//! End-to-end tests for the copyway binary.
//!
//! Every invocation points `COPYWAY_CONFIG` at a file that does not exist so a
//! user's own configuration never leaks into the results.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn copyway(temp_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("copyway").unwrap();
    cmd.env("COPYWAY_CONFIG", temp_dir.join("no-config.yml"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_runs() {
    let temp_dir = TempDir::new().unwrap();
    copyway(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--protocol"));
}

#[test]
fn test_version_runs() {
    let temp_dir = TempDir::new().unwrap();
    copyway(temp_dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_local_copy() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("a.txt");
    let dst = temp_dir.path().join("b.txt");
    fs::write(&src, "line1\nline2\n").unwrap();

    copyway(temp_dir.path())
        .args(["-p", "local"])
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Validation passed"))
        .stdout(predicate::str::contains("✓ Copy completed"));

    assert_eq!(fs::read_to_string(&dst).unwrap(), "line1\nline2\n");
}

#[test]
fn test_local_directory_copy_without_progress() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    fs::create_dir_all(src.join("nested")).unwrap();
    fs::write(src.join("top.txt"), "top").unwrap();
    fs::write(src.join("nested").join("deep.txt"), "deep").unwrap();
    let dst = temp_dir.path().join("dst");

    copyway(temp_dir.path())
        .args(["-p", "local", "--no-progress"])
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("→").not());

    assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
    assert_eq!(fs::read_to_string(dst.join("nested").join("deep.txt")).unwrap(), "deep");
}

#[test]
fn test_dry_run_copies_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("a.txt");
    let dst = temp_dir.path().join("b.txt");
    fs::write(&src, "line1\nline2\n").unwrap();

    copyway(temp_dir.path())
        .args(["-p", "local", "--dry-run"])
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY-RUN]"))
        .stdout(predicate::str::contains("Protocol: local"))
        .stdout(predicate::str::contains(src.to_string_lossy().as_ref()))
        .stdout(predicate::str::contains(dst.to_string_lossy().as_ref()));

    assert!(!dst.exists());
}

#[test]
fn test_dry_run_masks_password() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("a.txt");
    let dst = temp_dir.path().join("b.txt");
    fs::write(&src, "x").unwrap();

    copyway(temp_dir.path())
        .args(["-p", "local", "--dry-run", "--password", "hunter2"])
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("password: ****"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_invalid_protocol_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let dst = temp_dir.path().join("dest.txt");

    copyway(temp_dir.path())
        .args(["-p", "invalid", "source.txt"])
        .arg(&dst)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Validating").not())
        .stderr(predicate::str::contains("invalid"));

    assert!(!dst.exists());
}

#[test]
fn test_missing_source_fails() {
    let temp_dir = TempDir::new().unwrap();
    let dst = temp_dir.path().join("dest.txt");

    copyway(temp_dir.path())
        .args(["-p", "local", "/nonexistent/file.txt"])
        .arg(&dst)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("✗ Error: Source does not exist"));

    assert!(!dst.exists());
}

#[test]
fn test_missing_explicit_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("a.txt");
    fs::write(&src, "x").unwrap();

    copyway(temp_dir.path())
        .args(["-p", "local", "--config"])
        .arg(temp_dir.path().join("absent.yml"))
        .arg(&src)
        .arg(temp_dir.path().join("b.txt"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_config_file_supplies_settings() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("a.txt");
    let dst = temp_dir.path().join("b.txt");
    fs::write(&src, "x").unwrap();
    let config = temp_dir.path().join("copyway.yml");
    fs::write(&config, "protocols:\n  local:\n    progress: false\n").unwrap();

    copyway(temp_dir.path())
        .args(["-p", "local", "--config"])
        .arg(&config)
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("Copying").not());

    assert_eq!(fs::read_to_string(&dst).unwrap(), "x");
}

#[test]
fn test_verbose_logs_to_stderr() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("a.txt");
    let dst = temp_dir.path().join("b.txt");
    fs::write(&src, "x").unwrap();

    copyway(temp_dir.path())
        .args(["-p", "local", "-v", "--no-progress"])
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stderr(predicate::str::contains("transfer created"))
        .stdout(predicate::str::contains("transfer created").not());
}
