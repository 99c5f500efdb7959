//! Starter configuration generation
//!
//! `prompter --init` writes a commented workflow file seeded with a
//! verification command guessed from the project's build tooling.

use std::path::Path;

use eyre::{bail, Result};
use tracing::info;

/// Pick a verification command by looking at the project root
fn detect_verify_command(root: &Path) -> &'static str {
    if root.join("Cargo.toml").exists() {
        "cargo check"
    } else if root.join("package.json").exists() {
        "npm test"
    } else if root.join("pyproject.toml").exists() || root.join("setup.py").exists() {
        "python -m pytest"
    } else if root.join("Makefile").exists() {
        "make test"
    } else {
        "true"
    }
}

/// Write a starter workflow file at `path`
///
/// Refuses to overwrite an existing file.
pub fn generate_starter_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {}", path.display());
    }

    let root = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let verify_command = detect_verify_command(root);
    info!(path = %path.display(), verify_command, "Generating starter configuration");

    let contents = format!(
        r#"# prompter workflow
#
# Each task sends a prompt to the AI assistant, waits for the configured
# check interval, then runs verify_command; the task succeeds when the
# command exits with verify_success_code.

[settings]
check_interval = 5
max_retries = 3
# working_directory = "/path/to/project"
allow_infinite_loops = false
max_parallel_tasks = 4
enable_parallel = true

[[tasks]]
name = "fix_warnings"
prompt = "Fix all compiler warnings in this project"
verify_command = "{verify_command}"
on_success = "next"
on_failure = "retry"
max_attempts = 3
# timeout = 300
# depends_on = []
# exclusive = false
# resume_previous_session = false
"#
    );

    std::fs::write(path, contents)?;
    println!("Wrote starter configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::config::WorkflowConfig;

    #[test]
    fn test_detects_cargo_project() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("Cargo.toml"), "[package]").unwrap();
        assert_eq!(detect_verify_command(temp.path()), "cargo check");
    }

    #[test]
    fn test_detects_node_project() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("package.json"), "{}").unwrap();
        assert_eq!(detect_verify_command(temp.path()), "npm test");
    }

    #[test]
    fn test_detects_make_project() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("Makefile"), "test:").unwrap();
        assert_eq!(detect_verify_command(temp.path()), "make test");
    }

    #[test]
    fn test_fallback_command() {
        let temp = tempdir().unwrap();
        assert_eq!(detect_verify_command(temp.path()), "true");
    }

    #[test]
    fn test_generated_config_is_valid() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("prompter.toml");

        generate_starter_config(&path).unwrap();

        let config = WorkflowConfig::load(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.tasks.len(), 1);
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("prompter.toml");
        std::fs::write(&path, "existing").unwrap();

        let err = generate_starter_config(&path).unwrap_err();
        assert!(err.to_string().contains("refusing to overwrite"));
    }
}
