//! Verification command execution

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Hard ceiling on a single verification command
pub const VERIFICATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors from running the verification command itself
///
/// A non-matching exit code is not an error here; callers compare the exit
/// code against the task's expected success code.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verification command timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("error running verification command: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a verification command
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl VerificationResult {
    /// Check whether verification passed for the given success code
    pub fn passed(&self, success_exit_code: i32) -> bool {
        self.exit_code == success_exit_code
    }

    /// Human-readable summary recorded alongside task results
    pub fn describe(&self) -> String {
        format!(
            "Exit code: {}\nStdout: {}\nStderr: {}",
            self.exit_code, self.stdout, self.stderr
        )
    }
}

/// Run a shell command and capture its outcome
pub async fn run_verification(
    command: &str,
    working_directory: &Path,
    timeout: Duration,
) -> Result<VerificationResult, VerifyError> {
    let output = tokio::time::timeout(
        timeout,
        tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(working_directory)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| VerifyError::Timeout(timeout))??;

    Ok(VerificationResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
