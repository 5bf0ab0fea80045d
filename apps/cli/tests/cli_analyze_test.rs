//! Integration tests for the `costscope analyze` and `costscope windows` commands.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ROWS: &str = r#"[
  {"chargePeriodStart": "2026-09-18", "billedCost": "80", "consumedQuantity": 40, "tags": {"team": "Search"}},
  {"chargePeriodStart": "2026-09-25T10:00:00Z", "billedCost": 300, "consumedQuantity": 100, "tags": {"team": "A", "product": "P", "revenue": "600"}},
  {"chargePeriodStart": "2026-09-26", "billedCost": 100, "consumedQuantity": "50", "team": "B", "product": "P"},
  {"chargePeriodStart": "2026-09-27", "billedCost": 40, "tags": {"allocation_type": "shared"}}
]"#;

fn write_rows(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("rows.json");
    fs::write(&path, content).unwrap();
    path
}

fn costscope() -> Command {
    let mut cmd = Command::cargo_bin("costscope").unwrap();
    cmd.env_remove("COSTSCOPE__DEFAULT_PERIOD").env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_analyze_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let rows = write_rows(&temp_dir, ROWS);

    let assert = costscope()
        .arg("analyze")
        .arg("--rows")
        .arg(&rows)
        .arg("--period")
        .arg("2026-09-24..2026-09-30")
        .arg("--now")
        .arg("2026-09-30")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");

    assert_eq!(json["kpis"]["totalCost"], 440.0);
    assert_eq!(json["comparison"]["previous"]["totalCost"], 80.0);
    assert_eq!(json["allocation"]["sharedPoolTotal"], 40.0);
    assert_eq!(json["allocation"]["buckets"][0]["sharedAllocatedCost"], 30.0);
    assert_eq!(json["integrity"]["aggregationGuard"]["valid"], true);
    assert_eq!(json["unitEconomics"]["margin"]["available"], true);
}

#[test]
fn test_analyze_text_output() {
    let temp_dir = TempDir::new().unwrap();
    let rows = write_rows(&temp_dir, ROWS);

    costscope()
        .args(["analyze", "--format", "text", "--period", "2026-09-24..2026-09-30", "--now", "2026-09-30"])
        .arg("--rows")
        .arg(&rows)
        .assert()
        .success()
        .stdout(predicate::str::contains("Unit Economics Summary"))
        .stdout(predicate::str::contains("Unit Cost Waterfall"))
        .stdout(predicate::str::contains("Aggregation guard:     ok"));
}

#[test]
fn test_analyze_unknown_scope_is_empty_shape() {
    let temp_dir = TempDir::new().unwrap();
    let rows = write_rows(&temp_dir, ROWS);

    let assert = costscope()
        .args(["analyze", "--scope", "nobody", "--period", "last_7_days", "--now", "2026-09-30"])
        .arg("--rows")
        .arg(&rows)
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["kpis"]["totalCost"], 0.0);
    assert_eq!(json["trend"], serde_json::json!([]));
    assert_eq!(json["allocation"]["buckets"], serde_json::json!([]));
}

#[test]
fn test_analyze_scoped_document_and_filters() {
    let temp_dir = TempDir::new().unwrap();
    let rows = write_rows(
        &temp_dir,
        r#"{
          "acme": [
            {"chargePeriodStart": "2026-09-25", "billedCost": 10, "provider": "aws"},
            {"chargePeriodStart": "2026-09-25", "billedCost": 7, "provider": "gcp"}
          ]
        }"#,
    );

    let assert = costscope()
        .args(["analyze", "--scope", "acme", "--provider", "AWS", "--period", "2026-09-25..2026-09-25"])
        .args(["--now", "2026-09-30"])
        .arg("--rows")
        .arg(&rows)
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["kpis"]["totalCost"], 10.0);
}

#[test]
fn test_analyze_rejects_bad_basis() {
    let temp_dir = TempDir::new().unwrap();
    let rows = write_rows(&temp_dir, ROWS);

    costscope()
        .args(["analyze", "--basis", "blended"])
        .arg("--rows")
        .arg(&rows)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown cost basis"));
}

#[test]
fn test_analyze_missing_rows_file() {
    costscope()
        .args(["analyze", "--rows", "/definitely/not/here.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read rows file"));
}

#[test]
fn test_analyze_uses_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let rows = write_rows(&temp_dir, ROWS);
    let config = temp_dir.path().join("costscope.toml");
    fs::write(&config, "default_period = \"2026-09-24..2026-09-30\"\n\n[forecast]\ndefault_horizon_days = 21\n").unwrap();

    let assert = costscope()
        .arg("--config")
        .arg(&config)
        .args(["analyze", "--now", "2026-09-30"])
        .arg("--rows")
        .arg(&rows)
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["comparison"]["current"]["startDate"], "2026-09-24");
    assert_eq!(json["unitEconomics"]["forecast"]["horizonDays"], 21);
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("costscope.toml");
    fs::write(&config, "[confidence]\nlow_below = 95.0\nmedium_below = 10.0\n").unwrap();

    costscope()
        .arg("--config")
        .arg(&config)
        .args(["windows", "--period", "today"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid engine configuration"));
}

#[test]
fn test_windows_previous_period() {
    costscope()
        .args(["windows", "--period", "last_7_days", "--latest", "2026-09-30", "--now", "2026-10-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2026-09-24..2026-09-30"))
        .stdout(predicate::str::contains("2026-09-17..2026-09-23"));
}

#[test]
fn test_windows_json_and_compare_none() {
    let assert = costscope()
        .args(["windows", "--period", "previous_month", "--compare", "none", "--now", "2026-03-15", "--json"])
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["current"]["startDate"], "2026-02-01");
    assert_eq!(json["current"]["endDate"], "2026-02-28");
    assert!(json["previous"].is_null());
}

#[test]
fn test_windows_unresolvable_period() {
    costscope()
        .args(["windows", "--period", "someday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unresolvable period code"));
}
