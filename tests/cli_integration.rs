//! Integration tests for the pickr CLI
//!
//! These tests run the built binary against a temporary directory and
//! database, end to end, without mocking.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const BUNDLE: &str = r#"{
    "niches": [{ "title": "running" }],
    "users": [{
        "id": "u-1",
        "username": "ada",
        "niches": ["running"],
        "credentials": { "access_token": "tok", "access_token_secret": "sec" }
    }],
    "topics": [
        {
            "id": "t-1", "niche": "running", "name": "tempo runs", "source": "trend",
            "size": 40, "engagement": [1, 4, 9, 15],
            "drafts": [
                { "id": "d-1", "text": "Tempo runs build speed" },
                { "id": "d-2", "text": "Run comfortably hard" },
                { "id": "d-3", "text": "Twenty minutes is enough" }
            ]
        },
        {
            "id": "t-2", "niche": "running", "name": "stretching", "source": "evergreen", "size": 12,
            "drafts": [
                { "id": "d-4", "text": "Stretch after, not before" },
                { "id": "d-5", "text": "Hips first" },
                { "id": "d-6", "text": "Hold each stretch for thirty seconds" }
            ]
        }
    ]
}"#;

/// Helper to run pickr inside `dir` with its own database
fn run_pickr(args: &[&str], dir: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_pickr"))
        .args(args)
        .current_dir(dir)
        .env("PICKR_DB_PATH", dir.join("pickr.db"))
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute pickr")
}

/// Helper to get stdout as string
fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Helper to get stderr as string
fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Temp dir with the sample bundle imported
fn imported() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bundle.json"), BUNDLE).unwrap();
    let output = run_pickr(&["import", "bundle.json"], dir.path());
    assert!(output.status.success(), "import failed: {}", stderr(&output));
    dir
}

fn write_config(dir: &Path, contents: &str) {
    std::fs::create_dir_all(dir.join(".pickr")).unwrap();
    std::fs::write(dir.join(".pickr/config.toml"), contents).unwrap();
}

fn calendar_json(dir: &Path) -> serde_json::Value {
    let output = run_pickr(&["calendar", "ada", "--json"], dir);
    assert!(output.status.success(), "calendar failed: {}", stderr(&output));
    serde_json::from_str(&stdout(&output)).expect("calendar --json should print JSON")
}

// =============================================================================
// Basic Command Tests
// =============================================================================

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_pickr"))
        .arg("--help")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("pickr"));
    assert!(out.contains("schedule-all"));
}

#[test]
fn test_version_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_pickr"))
        .arg("--version")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    assert!(stdout(&output).contains("pickr"));
}

#[test]
fn test_completion_zsh() {
    let output = Command::new(env!("CARGO_BIN_EXE_pickr"))
        .args(["completion", "zsh"])
        .output()
        .expect("Failed to execute");

    assert!(output.status.success(), "completion zsh failed: {}", stderr(&output));
    assert!(stdout(&output).contains("#compdef pickr"));
}

#[test]
fn test_completion_bash() {
    let output = Command::new(env!("CARGO_BIN_EXE_pickr"))
        .args(["completion", "bash"])
        .output()
        .expect("Failed to execute");

    assert!(output.status.success(), "completion bash failed: {}", stderr(&output));
    assert!(stdout(&output).contains("_pickr"));
}

// =============================================================================
// Setup
// =============================================================================

#[test]
fn test_init_creates_project_files() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_pickr"))
        .arg("init")
        .current_dir(dir.path())
        .env_remove("PICKR_DB_PATH")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success(), "init failed: {}", stderr(&output));
    assert!(dir.path().join(".pickr/pickr.db").exists());
    assert!(dir.path().join(".pickr/config.toml").exists());
}

#[test]
fn test_import_and_status() {
    let dir = imported();

    let output = run_pickr(&["status"], dir.path());
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("users:     1"), "unexpected status: {}", out);
    assert!(out.contains("topics:    2"));
    assert!(out.contains("drafts:    6"));

    // Importing the same bundle again adds nothing
    let again = run_pickr(&["import", "bundle.json"], dir.path());
    assert!(again.status.success());
    assert!(stdout(&again).contains("0 niches, 0 users, 0 topics, 0 drafts"));
}

#[test]
fn test_import_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = run_pickr(&["import", "nope.json"], dir.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("nope.json"));
}

// =============================================================================
// Scheduling
// =============================================================================

#[test]
fn test_schedule_and_show_calendar() {
    let dir = imported();

    let output = run_pickr(&["schedule", "ada"], dir.path());
    assert!(output.status.success(), "schedule failed: {}", stderr(&output));
    assert!(stdout(&output).contains("6 slots"));

    let calendar = calendar_json(dir.path());
    let slots = calendar["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 6);
    assert!(slots.iter().all(|s| s["status"] == "suggested"));
    assert!(calendar["calendar"]["summary"].as_str().unwrap().contains("tempo runs"));

    // A second run for the same week is skipped unless forced
    let again = run_pickr(&["schedule", "ada"], dir.path());
    assert!(stdout(&again).contains("Skipped"));
    let forced = run_pickr(&["schedule", "ada", "--force"], dir.path());
    assert!(stdout(&forced).contains("Created"));

    let table = run_pickr(&["calendar", "ada"], dir.path());
    assert!(table.status.success());
    assert!(stdout(&table).contains("Mon 09:00"));
}

#[test]
fn test_schedule_unknown_user_fails() {
    let dir = imported();
    let output = run_pickr(&["schedule", "nobody"], dir.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("nobody"));
}

#[test]
fn test_schedule_all() {
    let dir = imported();
    let output = run_pickr(&["schedule-all"], dir.path());
    assert!(output.status.success(), "schedule-all failed: {}", stderr(&output));
    assert!(stdout(&output).contains("1 calendars"));
}

// =============================================================================
// Commit and Dispatch
// =============================================================================

#[test]
fn test_commit_dispatch_and_history_is_immutable() {
    let dir = imported();
    write_config(
        dir.path(),
        "[dispatch]\npublish_command = \"cat > /dev/null; echo post-42\"\n",
    );
    assert!(run_pickr(&["schedule", "ada"], dir.path()).status.success());

    let calendar = calendar_json(dir.path());
    let send_id = calendar["slots"][0]["send_id"].as_i64().unwrap().to_string();

    let commit = run_pickr(&["commit", &send_id, "2020-01-06T09:00:00Z"], dir.path());
    assert!(commit.status.success(), "commit failed: {}", stderr(&commit));

    let pending = run_pickr(&["pending"], dir.path());
    assert!(stdout(&pending).contains("2020-01-06T09:00:00Z"));

    let dispatch = run_pickr(&["dispatch"], dir.path());
    assert!(dispatch.status.success(), "dispatch failed: {}", stderr(&dispatch));
    assert!(stdout(&dispatch).contains("1 posted"));

    let calendar = calendar_json(dir.path());
    let slot = &calendar["slots"][0];
    assert_eq!(slot["status"], "posted");
    assert_eq!(slot["platform_post_id"], "post-42");

    // Posted sends cannot be moved or removed, and are not sent twice
    let uncommit = run_pickr(&["uncommit", &send_id], dir.path());
    assert!(!uncommit.status.success());
    assert!(stderr(&uncommit).contains("already posted"));
    let recommit = run_pickr(&["commit", &send_id, "2020-01-07T09:00:00Z"], dir.path());
    assert!(!recommit.status.success());

    let second = run_pickr(&["dispatch"], dir.path());
    assert!(stdout(&second).contains("0 posted"));
}

#[test]
fn test_commit_new_and_uncommit() {
    let dir = imported();

    let output = run_pickr(&["commit-new", "ada", "d-5", "2030-01-01 09:00"], dir.path());
    assert!(!output.status.success(), "commit beyond the horizon should fail");
    assert!(stderr(&output).contains("days ahead"));

    let output = run_pickr(&["commit-new", "ada", "d-5", "2020-01-01 09:00"], dir.path());
    assert!(output.status.success(), "commit-new failed: {}", stderr(&output));
    assert!(stdout(&output).contains("send 1"));

    let uncommit = run_pickr(&["uncommit", "1"], dir.path());
    assert!(uncommit.status.success(), "uncommit failed: {}", stderr(&uncommit));
    assert!(stdout(&run_pickr(&["pending"], dir.path())).contains("Nothing pending"));
}

#[test]
fn test_commit_rejects_unreadable_time() {
    let dir = imported();
    let output = run_pickr(&["commit-new", "ada", "d-1", "soon"], dir.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("cannot read 'soon'"));
}

#[test]
fn test_dispatch_without_publisher_fails() {
    let dir = imported();
    let output = run_pickr(&["dispatch"], dir.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("publish_command"));

    let dry = run_pickr(&["dispatch", "--dry-run"], dir.path());
    assert!(dry.status.success(), "dry run failed: {}", stderr(&dry));
}
