//! Sequential execution with task jumping
//!
//! Walks a linear task list with a cursor. A task's `on_success`/`on_failure`
//! action decides the next move: `next` and `retry` advance, `stop` ends the
//! run, `repeat` re-enters the same task, and any other word jumps to the
//! task of that name. A hard iteration ceiling contains runaway loops even
//! when `allow_infinite_loops` is set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use colored::Colorize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::{TaskSpec, WorkflowConfig};
use crate::executor::{TaskExecutor, TaskResult};
use crate::state::StateStore;

/// Default ceiling on engine iterations
pub const MAX_TASK_ITERATIONS: u32 = 1000;

/// Environment variable overriding the iteration ceiling
pub const MAX_ITERATIONS_ENV: &str = "PROMPTER_MAX_ITERATIONS";

/// Fatal sequential-engine errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("maximum iteration limit ({0}) reached, stopping to prevent a runaway loop")]
    IterationCeilingExceeded(u32),
}

/// Drives a linear task list, producing the same per-task results and state
/// updates as the parallel coordinator
pub struct SequentialEngine {
    config: Arc<WorkflowConfig>,
    executor: Arc<TaskExecutor>,
    state: Arc<StateStore>,
    verbose: bool,
}

impl SequentialEngine {
    pub fn new(
        config: Arc<WorkflowConfig>,
        executor: Arc<TaskExecutor>,
        state: Arc<StateStore>,
        verbose: bool,
    ) -> Self {
        Self {
            config,
            executor,
            state,
            verbose,
        }
    }

    /// Execute the given tasks in order, following jump/repeat/stop actions
    ///
    /// Jump targets may name any task in the configuration, not just the
    /// ones in `tasks_to_run`; they are appended to the working list on
    /// first use. Per-task outcomes land in the state store; the exit status
    /// is derived from it by the caller.
    pub async fn run(&self, tasks_to_run: Vec<TaskSpec>) -> Result<(), EngineError> {
        // Jumps can target any configured task.
        let task_map: HashMap<String, TaskSpec> = self
            .config
            .tasks
            .iter()
            .map(|t| (t.name.clone(), t.clone()))
            .collect();

        let mut tasks_list = tasks_to_run;
        let mut executed_tasks: HashSet<String> = HashSet::new();
        let mut iteration_count = 0u32;
        let mut index = 0usize;

        let max_iterations = iteration_ceiling();

        while index < tasks_list.len() {
            iteration_count += 1;
            if iteration_count > max_iterations {
                error!(limit = max_iterations, "Maximum iteration limit reached");
                println!(
                    "\nError: Maximum iteration limit ({max_iterations}) reached. Stopping execution."
                );
                return Err(EngineError::IterationCeilingExceeded(max_iterations));
            }

            let task = tasks_list[index].clone();

            if executed_tasks.contains(&task.name) && !self.config.settings.allow_infinite_loops {
                warn!(task = %task.name, "Task already executed, skipping to avoid a loop");
                index += 1;
                continue;
            }

            debug!(task = %task.name, iteration = iteration_count, "Processing task");
            println!("\nExecuting task: {}", task.name);
            if self.verbose {
                println!("  Prompt: {}", task.prompt);
                println!("  Verify command: {}", task.verify_command);
            }

            executed_tasks.insert(task.name.clone());

            self.state.mark_running(&task.name).await;
            let result = self.executor.run_task(&task).await;
            self.state.update(&result).await;

            if let Some(session) = &result.session_id {
                println!("  Assistant session: {session}");
            } else if task.resume_previous_session {
                if let Some(resumed) = self.state.get_previous_session_id(&task.name).await {
                    println!("  Assistant session (resumed): {resumed}");
                }
            }

            match self.next_index(&result, &task, &task_map, &mut tasks_list, index, &mut executed_tasks) {
                Some(next) => index = next,
                None => break,
            }
        }

        Ok(())
    }

    /// Decide where the cursor goes after a task's result
    ///
    /// Returns `None` to stop execution.
    fn next_index(
        &self,
        result: &TaskResult,
        task: &TaskSpec,
        task_map: &HashMap<String, TaskSpec>,
        tasks_list: &mut Vec<TaskSpec>,
        index: usize,
        executed_tasks: &mut HashSet<String>,
    ) -> Option<usize> {
        let (action, success) = if result.success {
            println!(
                "  {} Task completed successfully (attempts: {})",
                "✓".green(),
                result.attempts
            );
            if self.verbose && !result.verification_output.is_empty() {
                println!("  Verification output: {}", result.verification_output);
            }
            (task.on_success.as_str(), true)
        } else {
            println!("  {} Task failed (attempts: {})", "✗".red(), result.attempts);
            println!("  Error: {}", result.error);
            (task.on_failure.as_str(), false)
        };

        match action {
            "stop" => {
                debug!(task = %task.name, success, "Stop action");
                println!(
                    "Stopping execution {}.",
                    if success {
                        "after successful task"
                    } else {
                        "due to task failure"
                    }
                );
                None
            }
            "repeat" if success => {
                debug!(task = %task.name, "Repeat action");
                println!("Repeating task...");
                // The only sanctioned way to re-enter an executed task.
                executed_tasks.remove(&task.name);
                Some(index)
            }
            "next" => Some(index + 1),
            "retry" if !success => Some(index + 1),
            target if task_map.contains_key(target) => {
                debug!(task = %task.name, target, success, "Jump action");
                println!("Jumping to task: {target}");

                if !tasks_list.iter().any(|t| t.name == target) {
                    tasks_list.push(task_map[target].clone());
                }
                tasks_list.iter().position(|t| t.name == target)
            }
            _ => Some(index + 1),
        }
    }
}

/// Ceiling from the environment override, falling back to the default
fn iteration_ceiling() -> u32 {
    std::env::var(MAX_ITERATIONS_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(MAX_TASK_ITERATIONS)
}
