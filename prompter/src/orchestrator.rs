//! Top-level workflow execution
//!
//! Picks the execution mode (parallel when the workflow declares
//! dependencies, sequential otherwise), wires the engines together, and
//! derives the process exit status from the final state.

use std::sync::Arc;

use colored::Colorize;
use eyre::{Result, WrapErr};
use tracing::{error, info};

use crate::agent::AgentClient;
use crate::config::{TaskSpec, WorkflowConfig};
use crate::coordinator::ParallelCoordinator;
use crate::executor::TaskExecutor;
use crate::progress::{NullObserver, ProgressDisplay, ProgressMode, ProgressObserver};
use crate::sequential::SequentialEngine;
use crate::state::{StateStore, TaskState};

/// Per-invocation options carried from the CLI
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub dry_run: bool,
    pub verbose: bool,

    /// Run only this task (forces sequential mode)
    pub task: Option<String>,

    pub progress_mode: ProgressMode,
}

/// Execute a validated workflow and return the process exit code
pub async fn run_workflow(
    config: WorkflowConfig,
    state: Arc<StateStore>,
    agent: Arc<dyn AgentClient>,
    options: RuntimeOptions,
) -> Result<i32> {
    let config = Arc::new(config);

    let tasks_to_run: Vec<TaskSpec> = match &options.task {
        Some(name) => match config.get_task(name) {
            Some(task) => vec![task.clone()],
            None => {
                eprintln!("Error: Task '{name}' not found in configuration");
                return Ok(1);
            }
        },
        None => config.tasks.clone(),
    };

    println!("Running {} task(s)...", tasks_to_run.len());
    if options.dry_run {
        println!("[DRY RUN MODE - No actual changes will be made]");
    }

    let executor = Arc::new(TaskExecutor::new(agent, state.clone(), &config, options.dry_run));

    let use_parallel =
        config.settings.enable_parallel && config.has_dependencies() && options.task.is_none();

    let mut aborted = false;

    if use_parallel {
        info!("Using parallel execution due to task dependencies");
        println!(
            "\nParallel execution enabled (max {} concurrent tasks)",
            config.settings.max_parallel_tasks
        );

        let mode = options.progress_mode.resolve();
        let observer: Arc<dyn ProgressObserver> = match mode {
            ProgressMode::None => Arc::new(NullObserver),
            _ => Arc::new(ProgressDisplay::new(
                mode,
                config.tasks.len(),
                workflow_name(&config),
            )),
        };

        let coordinator = Arc::new(
            ParallelCoordinator::new(config.clone(), executor, state.clone(), observer)
                .wrap_err("building the task dependency graph")?,
        );
        coordinator.execute_all().await;
    } else {
        info!("Using sequential execution");
        if config.has_dependencies() {
            println!("\nNote: Dependencies defined but parallel execution is disabled");
        }

        let engine = SequentialEngine::new(config.clone(), executor, state.clone(), options.verbose);
        if let Err(e) = engine.run(tasks_to_run).await {
            error!(error = %e, "Sequential execution aborted");
            aborted = true;
        }
    }

    println!("\nFinal status:");
    print_status(&state, options.verbose).await;

    let failed = state.get_failed().await;
    Ok(if failed.is_empty() && !aborted { 0 } else { 1 })
}

/// Print a human-readable summary of the state store
pub async fn print_status(state: &StateStore, verbose: bool) {
    let summary = state.get_summary().await;

    println!("Session: {}", summary.session_id);
    println!(
        "Tasks: {} total - {} completed, {} failed, {} running, {} pending",
        summary.total_tasks, summary.completed, summary.failed, summary.running, summary.pending
    );

    let snapshot = state.snapshot().await;
    for record in &snapshot.task_states {
        let status = match record.status {
            TaskState::Completed => record.status.to_string().green().to_string(),
            TaskState::Failed => record.status.to_string().red().to_string(),
            TaskState::Running => record.status.to_string().cyan().to_string(),
            TaskState::Pending => record.status.to_string(),
        };
        println!("  {}: {status}", record.name);

        if verbose {
            if record.attempts > 0 {
                println!("    attempts: {}", record.attempts);
            }
            if let Some(last_attempt) = record.last_attempt {
                println!("    last attempt: {last_attempt}");
            }
            if !record.error_message.is_empty() {
                println!("    error: {}", record.error_message);
            }
        }
    }

    if verbose && summary.total_results > 0 {
        println!("Results recorded: {}", summary.total_results);
    }
}

fn workflow_name(config: &WorkflowConfig) -> String {
    config
        .config_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "workflow".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    use crate::agent::{AgentError, AgentResponse, PromptRequest};
    use crate::config::Settings;

    struct OkAgent;

    #[async_trait]
    impl AgentClient for OkAgent {
        async fn run_prompt(&self, _request: PromptRequest) -> Result<AgentResponse, AgentError> {
            Ok(AgentResponse {
                output: "ok".to_string(),
                session_id: None,
            })
        }
    }

    fn spec(name: &str, verify: &str, deps: &[&str]) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            prompt: name.to_string(),
            verify_command: verify.to_string(),
            max_attempts: 1,
            on_failure: "stop".to_string(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    fn config_with(dir: &std::path::Path, tasks: Vec<TaskSpec>, enable_parallel: bool) -> WorkflowConfig {
        WorkflowConfig {
            config_path: dir.join("workflow.toml"),
            settings: Settings {
                check_interval: 0,
                enable_parallel,
                working_directory: Some(dir.display().to_string()),
                ..Default::default()
            },
            tasks,
        }
    }

    async fn run(
        dir: &std::path::Path,
        tasks: Vec<TaskSpec>,
        enable_parallel: bool,
        task: Option<String>,
    ) -> i32 {
        let config = config_with(dir, tasks, enable_parallel);
        let state = Arc::new(StateStore::load(dir.join("state.json")).await);
        run_workflow(
            config,
            state,
            Arc::new(OkAgent),
            RuntimeOptions {
                task,
                progress_mode: ProgressMode::None,
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_sequential_success_exit_code() {
        let temp = tempdir().unwrap();
        let code = run(temp.path(), vec![spec("a", "true", &[])], true, None).await;
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_parallel_failure_exit_code() {
        let temp = tempdir().unwrap();
        let tasks = vec![spec("a", "false", &[]), spec("b", "true", &["a"])];
        let code = run(temp.path(), tasks, true, None).await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_single_task_forces_sequential() {
        let temp = tempdir().unwrap();
        // Dependencies exist, but naming a task keeps execution sequential
        // and runs only that task.
        let tasks = vec![spec("a", "true", &[]), spec("b", "true", &["a"])];
        let code = run(temp.path(), tasks, true, Some("b".to_string())).await;
        assert_eq!(code, 0);

        let state = StateStore::load(temp.path().join("state.json")).await;
        assert_eq!(state.get_completed().await, vec!["b"]);
        assert!(state.get_state("a").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_task_name() {
        let temp = tempdir().unwrap();
        let code = run(
            temp.path(),
            vec![spec("a", "true", &[])],
            true,
            Some("ghost".to_string()),
        )
        .await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_parallel_disabled_runs_sequentially() {
        let temp = tempdir().unwrap();
        let tasks = vec![spec("a", "true", &[]), spec("b", "true", &["a"])];
        let code = run(temp.path(), tasks, false, None).await;
        assert_eq!(code, 0);

        let state = StateStore::load(temp.path().join("state.json")).await;
        assert_eq!(state.get_completed().await, vec!["a", "b"]);
    }
}
