use assert_cmd::Command;
use chrono::Utc;
use predicates::prelude::*;
use slowpro_core::analysis::AggregateStats;
use slowpro_core::record::{RequestRecord, ResourceType};
use slowpro_core::session::{DirectoryStorage, SessionId, SessionInfo, SessionWriter};
use std::path::{Path, PathBuf};

#[allow(deprecated)]
fn get_slowpro_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("slowpro")
}

fn record(session: &str, id: &str, domain: &str, start: f64, duration: f64) -> RequestRecord {
    RequestRecord {
        request_id: id.to_string(),
        url: format!("https://{}/{}", domain, id),
        domain: domain.to_string(),
        method: "GET".to_string(),
        resource_type: ResourceType::Script,
        mime_type: Some("text/javascript".to_string()),
        start_time: start,
        end_time: Some(start + duration),
        status_code: Some(200),
        encoded_body_size: Some(500),
        duration_ms: Some(duration),
        failed: false,
        error_text: None,
        session_id: SessionId::new(session),
        captured_at: Utc::now(),
    }
}

/// Persist a sealed session with `records` under `data_dir`
fn seed_session(data_dir: &Path, session: &str, records: Vec<RequestRecord>) {
    let info = SessionInfo {
        session_id: SessionId::new(session),
        started_at: Utc::now(),
        ended_at: None,
    };
    let mut writer = SessionWriter::new(info, DirectoryStorage::new(data_dir));
    for record in records {
        writer.append(record).unwrap();
    }
    writer.seal().unwrap();
}

fn seeded_data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    seed_session(
        dir.path(),
        "20240101_090000",
        vec![
            record("20240101_090000", "1", "example.com", 0.0, 100.0),
            record("20240101_090000", "2", "other.com", 5.0, 300.0),
        ],
    );
    seed_session(
        dir.path(),
        "20240102_090000",
        vec![
            record("20240102_090000", "1", "example.com", 0.0, 40.0),
            record("20240102_090000", "2", "example.com", 1.0, 60.0),
            record("20240102_090000", "3", "cdn.example.com", 2.0, 80.0),
        ],
    );
    dir
}

fn read_report(path: &Path) -> AggregateStats {
    let json = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&json).unwrap()
}

#[test]
fn test_report_defaults_to_latest_session() {
    let data = seeded_data_dir();
    let out = tempfile::tempdir().unwrap();
    let report = out.path().join("report.json");

    Command::new(get_slowpro_bin())
        .arg("report")
        .arg("--data-dir")
        .arg(data.path())
        .arg("--output")
        .arg(&report)
        .assert()
        .success()
        .stderr(predicate::str::contains("Report written to"))
        .stderr(predicate::str::contains("report.json"));

    let stats = read_report(&report);
    assert_eq!(stats.global.total_requests, 3);
    assert_eq!(stats.global.total_sessions, 1);
    assert_eq!(stats.global.avg_duration_ms, Some(60.0));
}

#[test]
fn test_report_all_sessions() {
    let data = seeded_data_dir();
    let report = data.path().join("all.json");

    Command::new(get_slowpro_bin())
        .args(["report", "--all", "--format", "json", "--output"])
        .arg(&report)
        .env("SLOWPRO_DATA_DIR", data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_requests\": 5"));

    let stats = read_report(&report);
    assert_eq!(stats.global.total_sessions, 2);
    assert_eq!(stats.global.total_domains, 3);
    assert_eq!(stats.slowest_requests[0].domain, "other.com");
}

#[test]
fn test_report_domain_glob_spans_sessions() {
    let data = seeded_data_dir();
    let report = data.path().join("domains.json");

    Command::new(get_slowpro_bin())
        .arg("--data-dir")
        .arg(data.path())
        .args(["report", "--domains", "example.com", "*.example.com", "--output"])
        .arg(&report)
        .assert()
        .success();

    let stats = read_report(&report);
    assert_eq!(stats.global.total_requests, 4);
    assert!(!stats.domains.contains_key("other.com"));
}

#[test]
fn test_report_top_limits_rankings() {
    let data = seeded_data_dir();
    let report = data.path().join("top.json");

    Command::new(get_slowpro_bin())
        .arg("--data-dir")
        .arg(data.path())
        .args(["report", "--all", "--top", "2", "--output"])
        .arg(&report)
        .assert()
        .success();

    let stats = read_report(&report);
    let durations: Vec<f64> = stats
        .slowest_requests
        .iter()
        .map(|r| r.duration_ms.unwrap())
        .collect();
    assert_eq!(durations, vec![300.0, 100.0]);
}

#[test]
fn test_report_without_data_fails() {
    let empty = tempfile::tempdir().unwrap();

    Command::new(get_slowpro_bin())
        .arg("--data-dir")
        .arg(empty.path())
        .arg("report")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No session data found"));
}

#[test]
fn test_report_unknown_session_fails() {
    let data = seeded_data_dir();

    Command::new(get_slowpro_bin())
        .arg("--data-dir")
        .arg(data.path())
        .args(["report", "--sessions", "19990101_000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no sessions match"));
}

#[test]
fn test_report_names_corrupt_file() {
    let data = seeded_data_dir();
    let corrupt = data
        .path()
        .join("example.com")
        .join("session_20240102_090000.json");
    std::fs::write(&corrupt, "{ not json").unwrap();

    Command::new(get_slowpro_bin())
        .arg("--data-dir")
        .arg(data.path())
        .arg("report")
        .assert()
        .failure()
        .stderr(predicate::str::contains("session_20240102_090000.json"));
}

#[test]
fn test_report_all_conflicts_with_domains() {
    Command::new(get_slowpro_bin())
        .args(["report", "--all", "--domains", "a.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_report_pretty_output() {
    let data = seeded_data_dir();
    let report = data.path().join("pretty.json");

    Command::new(get_slowpro_bin())
        .arg("--data-dir")
        .arg(data.path())
        .args(["report", "--all", "--output"])
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("Slowpro Performance Report"))
        .stdout(predicate::str::contains("Slowest Requests:"))
        .stdout(predicate::str::contains("other.com"));
}
