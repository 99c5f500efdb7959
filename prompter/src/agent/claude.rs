//! Claude CLI client

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{AgentClient, AgentError, AgentResponse, PromptRequest};

/// Invokes the Claude CLI as a subprocess
///
/// Prompts run as `claude -p <prompt> --output-format json`, which reports
/// the conversation's `session_id` alongside the result text. Output that is
/// not JSON (older CLI versions, wrapper scripts) is passed through verbatim.
pub struct ClaudeCliClient {
    command: String,
    working_directory: PathBuf,
}

impl ClaudeCliClient {
    pub fn new(command: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_directory: working_directory.into(),
        }
    }
}

#[async_trait]
impl AgentClient for ClaudeCliClient {
    async fn run_prompt(&self, request: PromptRequest) -> Result<AgentResponse, AgentError> {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.arg("-p")
            .arg(&request.prompt)
            .arg("--output-format")
            .arg("json")
            .current_dir(&self.working_directory)
            .kill_on_drop(true);

        if let Some(system_prompt) = &request.system_prompt {
            cmd.arg("--append-system-prompt").arg(system_prompt);
        }
        if let Some(session) = &request.resume_session {
            debug!(session = %session, "Resuming previous assistant session");
            cmd.arg("--resume").arg(session);
        }

        let output = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| AgentError::Timeout(limit))?,
            None => cmd.output().await,
        }
        .map_err(|source| AgentError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(AgentError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        Ok(parse_cli_output(&stdout))
    }
}

/// Extract the result text and session id from the CLI's JSON output,
/// falling back to the raw stdout when it is not JSON
fn parse_cli_output(stdout: &str) -> AgentResponse {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout.trim()) {
        let session_id = value
            .get("session_id")
            .and_then(|v| v.as_str())
            .map(String::from);
        let output = value
            .get("result")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| stdout.to_string());
        return AgentResponse { output, session_id };
    }

    AgentResponse {
        output: stdout.to_string(),
        session_id: None,
    }
}
