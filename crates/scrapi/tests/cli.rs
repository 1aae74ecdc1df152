use serde_json::Value;
use std::process::Command;
use tempfile::TempDir;

fn scrapi() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_scrapi"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_normalize_prints_reflowed_markup() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("page.html");
    std::fs::write(&page, "<div><p>hi</p></div>").unwrap();

    let out = scrapi().arg("normalize").arg(&page).output().unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim_end(), "<!DOCTYPE html>\n<div>\n  <p>hi</p>\n</div>");
}

#[test]
fn test_doctor_json_reports_checks() {
    let out = scrapi().args(["--json", "doctor"]).output().unwrap();
    assert!(out.status.success());
    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(report["ready"].is_boolean());
    let names: Vec<&str> = report["checks"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["browserbase", "chromium", "agent", "executor"]);
}

#[test]
fn test_error_exits_one_with_json_object() {
    let out = scrapi()
        .args(["--json", "capture", "not a url", "--local"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let err: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(err["error"], true);
    assert!(err["message"].as_str().unwrap().contains("invalid URL"));
}

#[test]
fn test_synthesize_without_agent_key_fails() {
    let dir = TempDir::new().unwrap();
    let transcript = dir.path().join("out.json");
    std::fs::write(&transcript, r#"{"url": "https://x.test/", "events": []}"#).unwrap();

    let out = scrapi()
        .env_remove("V0_API_KEY")
        .args(["synthesize", "--output-schema", "array<any>", "--prompt", "anything"])
        .arg("--transcript")
        .arg(&transcript)
        .arg("--out-dir")
        .arg(dir.path().join("out"))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("V0_API_KEY is not set"));
}
