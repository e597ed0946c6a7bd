use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_slowpro_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("slowpro")
}

fn write_legacy_session(root: &std::path::Path, domain: &str, session: &str) {
    let dir = root.join(domain);
    std::fs::create_dir_all(&dir).unwrap();
    // bare-array files written by older captures
    std::fs::write(dir.join(format!("session_{}.json", session)), "[]").unwrap();
}

#[test]
fn test_sessions_lists_discovered_sessions() {
    let data = tempfile::tempdir().unwrap();
    write_legacy_session(data.path(), "a.com", "20240101_000000");
    write_legacy_session(data.path(), "b.com", "20240101_000000");
    write_legacy_session(data.path(), "a.com", "20240305_101010");

    Command::new(get_slowpro_bin())
        .arg("--data-dir")
        .arg(data.path())
        .arg("sessions")
        .assert()
        .success()
        .stdout(predicate::str::contains("20240101_000000"))
        .stdout(predicate::str::contains("20240305_101010"))
        .stdout(predicate::str::contains("(latest)"))
        .stdout(predicate::str::contains("b.com"));
}

#[test]
fn test_sessions_json_format() {
    let data = tempfile::tempdir().unwrap();
    write_legacy_session(data.path(), "a.com", "20240101_000000");

    let output = Command::new(get_slowpro_bin())
        .arg("--data-dir")
        .arg(data.path())
        .args(["--format", "json", "sessions"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listing[0]["session_id"], "20240101_000000");
    assert_eq!(listing[0]["domains"][0], "a.com");
}

#[test]
fn test_sessions_empty_directory() {
    let data = tempfile::tempdir().unwrap();

    Command::new(get_slowpro_bin())
        .arg("--data-dir")
        .arg(data.path())
        .arg("sessions")
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions found"));
}
