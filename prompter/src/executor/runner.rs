//! Task attempt loop

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::agent::{AgentClient, PromptRequest};
use crate::config::{TaskSpec, WorkflowConfig};
use crate::state::StateStore;

use super::verify::{run_verification, VERIFICATION_TIMEOUT};

/// Result of executing one task (one batch of attempts)
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_name: String,
    pub success: bool,
    pub output: String,
    pub error: String,
    pub verification_output: String,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
}

impl TaskResult {
    fn new(task_name: &str, success: bool, attempts: u32) -> Self {
        Self {
            task_name: task_name.to_string(),
            success,
            output: String::new(),
            error: String::new(),
            verification_output: String::new(),
            attempts,
            timestamp: Utc::now(),
            session_id: None,
        }
    }
}

/// Executes a single task: prompt, settle, verify, retry
pub struct TaskExecutor {
    agent: Arc<dyn AgentClient>,
    state: Arc<StateStore>,
    check_interval: Duration,
    working_directory: PathBuf,
    dry_run: bool,
}

impl TaskExecutor {
    pub fn new(
        agent: Arc<dyn AgentClient>,
        state: Arc<StateStore>,
        config: &WorkflowConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            agent,
            state,
            check_interval: Duration::from_secs(config.settings.check_interval),
            working_directory: config.working_directory(),
            dry_run,
        }
    }

    /// Run one task to a final result
    ///
    /// Never returns an error: every failure mode ends up in the result's
    /// `error` text with `success = false`.
    pub async fn run_task(&self, task: &TaskSpec) -> TaskResult {
        info!(task = %task.name, "Starting task");

        if self.dry_run {
            return self.dry_run_task(task);
        }

        let mut attempts = 0u32;
        while attempts < task.max_attempts {
            attempts += 1;
            debug!(task = %task.name, attempt = attempts, max = task.max_attempts, "Attempt");

            let resume_session = if task.resume_previous_session {
                self.state.get_previous_session_id(&task.name).await
            } else {
                None
            };

            let request = PromptRequest {
                prompt: task.prompt.clone(),
                system_prompt: task.system_prompt.clone(),
                resume_session,
                timeout: task.timeout.map(Duration::from_secs),
            };

            let response = match self.agent.run_prompt(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(task = %task.name, attempt = attempts, error = %e, "Prompt invocation failed");
                    if attempts >= task.max_attempts {
                        let mut result = TaskResult::new(&task.name, false, attempts);
                        result.error =
                            format!("Failed to execute assistant prompt after {attempts} attempts: {e}");
                        return result;
                    }
                    continue;
                }
            };

            // Let the assistant's side effects settle on disk before checking.
            if !self.check_interval.is_zero() {
                tokio::time::sleep(self.check_interval).await;
            }

            let (passed, verification_output) = match run_verification(
                &task.verify_command,
                &self.working_directory,
                VERIFICATION_TIMEOUT,
            )
            .await
            {
                Ok(verification) => (
                    verification.passed(task.verify_success_code),
                    verification.describe(),
                ),
                Err(e) => (false, e.to_string()),
            };

            if passed {
                let mut result = TaskResult::new(&task.name, true, attempts);
                result.output = response.output;
                result.verification_output = verification_output;
                result.session_id = response.session_id;
                return result;
            }

            debug!(task = %task.name, attempt = attempts, on_failure = %task.on_failure, "Verification failed");

            match task.on_failure.as_str() {
                "retry" => continue,
                "next" => {
                    let mut result = TaskResult::new(&task.name, false, attempts);
                    result.output = response.output;
                    result.error =
                        format!("Verification failed, moving to next task: {verification_output}");
                    result.verification_output = verification_output;
                    result.session_id = response.session_id;
                    return result;
                }
                // "stop" and jump targets both end the attempt loop here; the
                // engine decides what the action means.
                _ => {
                    let mut result = TaskResult::new(&task.name, false, attempts);
                    result.output = response.output;
                    result.error = format!("Verification failed: {verification_output}");
                    result.verification_output = verification_output;
                    result.session_id = response.session_id;
                    return result;
                }
            }
        }

        let mut result = TaskResult::new(&task.name, false, attempts);
        result.error = format!("Task failed after {} attempts", task.max_attempts);
        result
    }

    fn dry_run_task(&self, task: &TaskSpec) -> TaskResult {
        let prompt_head: String = task.prompt.chars().take(50).collect();
        let mut result = TaskResult::new(&task.name, true, 1);
        result.output = format!("[DRY RUN] Would execute prompt: {prompt_head}...");
        result.verification_output =
            format!("[DRY RUN] Would run verification: {}", task.verify_command);
        result
    }
}
