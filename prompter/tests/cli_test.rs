//! Binary-level CLI tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn prompter() -> Command {
    Command::cargo_bin("prompter").unwrap()
}

#[test]
fn test_help() {
    prompter()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("workflow"));
}

#[test]
fn test_missing_config_is_an_error() {
    let temp = tempdir().unwrap();
    prompter()
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file is required"));
}

#[test]
fn test_nonexistent_config_file() {
    let temp = tempdir().unwrap();
    prompter()
        .current_dir(temp.path())
        .arg("missing.toml")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn test_validation_errors_reported() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("workflow.toml");
    std::fs::write(
        &config,
        r#"
[[tasks]]
name = "stop"
prompt = "p"
verify_command = "true"
"#,
    )
    .unwrap();

    prompter()
        .current_dir(temp.path())
        .arg("workflow.toml")
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("Configuration errors:")
                .and(predicate::str::contains("reserved word")),
        );
}

#[test]
fn test_dry_run_completes() {
    let temp = tempdir().unwrap();
    std::fs::write(
        temp.path().join("workflow.toml"),
        r#"
[settings]
check_interval = 0

[[tasks]]
name = "build"
prompt = "Fix the build"
verify_command = "true"
"#,
    )
    .unwrap();

    prompter()
        .current_dir(temp.path())
        .args(["workflow.toml", "--dry-run", "--no-progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN"));
}

#[test]
fn test_cycle_rejected_before_execution() {
    let temp = tempdir().unwrap();
    std::fs::write(
        temp.path().join("workflow.toml"),
        r#"
[[tasks]]
name = "x"
prompt = "p"
verify_command = "true"
depends_on = ["z"]

[[tasks]]
name = "y"
prompt = "p"
verify_command = "true"
depends_on = ["x"]

[[tasks]]
name = "z"
prompt = "p"
verify_command = "true"
depends_on = ["y"]
"#,
    )
    .unwrap();

    prompter()
        .current_dir(temp.path())
        .arg("workflow.toml")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Circular dependency detected"));
}

#[test]
fn test_status_with_no_state() {
    let temp = tempdir().unwrap();
    prompter()
        .current_dir(temp.path())
        .arg("--status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tasks: 0 total"));
}

#[test]
fn test_clear_state() {
    let temp = tempdir().unwrap();
    let state_file = temp.path().join(".prompter_state.json");
    std::fs::write(
        &state_file,
        r#"{"session_id":"s","start_time":"2026-01-01T00:00:00Z","last_update":"2026-01-01T00:00:00Z","task_states":[],"results_history":[]}"#,
    )
    .unwrap();

    prompter()
        .current_dir(temp.path())
        .arg("--clear-state")
        .assert()
        .success()
        .stdout(predicate::str::contains("State cleared."));

    assert!(!state_file.exists());
}

#[test]
fn test_init_writes_starter_config() {
    let temp = tempdir().unwrap();
    prompter()
        .current_dir(temp.path())
        .arg("--init")
        .assert()
        .success();

    let written = std::fs::read_to_string(temp.path().join("prompter.toml")).unwrap();
    assert!(written.contains("[[tasks]]"));

    // A second run must not clobber the file.
    prompter()
        .current_dir(temp.path())
        .arg("--init")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("refusing to overwrite"));
}

#[test]
fn test_dry_run_writes_state_file() {
    let temp = tempdir().unwrap();
    std::fs::write(
        temp.path().join("workflow.toml"),
        r#"
[settings]
check_interval = 0

[[tasks]]
name = "build"
prompt = "p"
verify_command = "true"
"#,
    )
    .unwrap();

    prompter()
        .current_dir(temp.path())
        .args(["workflow.toml", "--dry-run", "--no-progress"])
        .assert()
        .success();

    let state = std::fs::read_to_string(temp.path().join(".prompter_state.json")).unwrap();
    assert!(state.contains("\"build\""));
    assert!(state.contains("completed"));
}
