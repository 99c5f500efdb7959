//! Assistant invocation errors

use std::time::Duration;

use thiserror::Error;

/// Errors from invoking the assistant command
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("assistant command failed (exit code {code}): {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("assistant command timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
}
