//! Workflow configuration: TOML loading and validation
//!
//! A workflow file has a `[settings]` table and an array of `[[tasks]]`.
//! Parsing is permissive (serde defaults everywhere); `validate` then checks
//! the whole document and reports every problem at once, so users fix their
//! file in one pass instead of replaying errors one by one.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::graph::{GraphError, TaskGraph};

/// Action words that cannot be used as task names
pub const RESERVED_ACTIONS: [&str; 4] = ["next", "stop", "retry", "repeat"];

const ON_SUCCESS_ACTIONS: [&str; 3] = ["next", "stop", "repeat"];
const ON_FAILURE_ACTIONS: [&str; 3] = ["retry", "stop", "next"];

/// Errors loading or validating a workflow file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error in {path}:\n{source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("configuration errors:\n{}", format_problems(.0))]
    Invalid(Vec<String>),
}

fn format_problems(problems: &[String]) -> String {
    problems
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `[settings]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds to wait between the assistant finishing and verification
    pub check_interval: u64,

    pub max_retries: u32,

    /// Directory tasks run in; the process working directory when absent
    pub working_directory: Option<String>,

    /// Permit jumps back into already-executed tasks
    pub allow_infinite_loops: bool,

    pub max_parallel_tasks: usize,

    pub enable_parallel: bool,

    /// Assistant binary to invoke
    pub claude_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_interval: 5,
            max_retries: 3,
            working_directory: None,
            allow_infinite_loops: false,
            max_parallel_tasks: 4,
            enable_parallel: true,
            claude_command: "claude".to_string(),
        }
    }
}

/// One `[[tasks]]` entry, immutable once parsed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSpec {
    pub name: String,
    pub prompt: String,
    pub verify_command: String,
    pub verify_success_code: i32,
    pub on_success: String,
    pub on_failure: String,
    pub max_attempts: u32,

    /// Seconds allowed for a single assistant invocation
    pub timeout: Option<u64>,

    pub resume_previous_session: bool,
    pub system_prompt: Option<String>,
    pub depends_on: Vec<String>,

    // Advisory resource hints; only `exclusive` is enforced.
    pub cpu_required: f64,
    pub memory_required: u64,
    pub priority: i64,
    pub exclusive: bool,
}

impl Default for TaskSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            prompt: String::new(),
            verify_command: String::new(),
            verify_success_code: 0,
            on_success: "next".to_string(),
            on_failure: "retry".to_string(),
            max_attempts: 3,
            timeout: None,
            resume_previous_session: false,
            system_prompt: None,
            depends_on: Vec::new(),
            cpu_required: 1.0,
            memory_required: 512,
            priority: 0,
            exclusive: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    settings: Settings,
    tasks: Vec<TaskSpec>,
}

/// Parsed workflow configuration
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub config_path: PathBuf,
    pub settings: Settings,
    pub tasks: Vec<TaskSpec>,
}

impl WorkflowConfig {
    /// Load and parse a workflow file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        debug!(tasks = raw.tasks.len(), "Parsed configuration");

        Ok(Self {
            config_path: path.to_path_buf(),
            settings: raw.settings,
            tasks: raw.tasks,
        })
    }

    pub fn get_task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn has_dependencies(&self) -> bool {
        self.tasks.iter().any(|t| !t.depends_on.is_empty())
    }

    /// Directory tasks run in
    pub fn working_directory(&self) -> PathBuf {
        match &self.settings.working_directory {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Check the whole document, collecting every problem before reporting
    ///
    /// All problems come back together in [`ConfigError::Invalid`], so users
    /// fix their file in one pass instead of replaying errors one by one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = self.collect_validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    fn collect_validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.tasks.is_empty() {
            errors.push("No tasks defined in configuration".to_string());
        }

        let task_names: Vec<&str> = self.tasks.iter().map(|t| t.name.as_str()).collect();

        for (i, task) in self.tasks.iter().enumerate() {
            if task.name.is_empty() {
                errors.push(format!("Task {i}: name is required"));
            } else if RESERVED_ACTIONS.contains(&task.name.as_str()) {
                errors.push(format!(
                    "Task {i}: name '{}' is a reserved word and cannot be used as a task name. \
                     Reserved words are: {}",
                    task.name,
                    RESERVED_ACTIONS.join(", ")
                ));
            } else if task_names.iter().filter(|n| **n == task.name).count() > 1 {
                errors.push(format!("Task {i}: duplicate task name '{}'", task.name));
            }

            if task.prompt.is_empty() {
                errors.push(format!("Task {i} ({}): prompt is required", task.name));
            }
            if task.verify_command.is_empty() {
                errors.push(format!("Task {i} ({}): verify_command is required", task.name));
            }

            if !ON_SUCCESS_ACTIONS.contains(&task.on_success.as_str())
                && !task_names.contains(&task.on_success.as_str())
            {
                errors.push(format!(
                    "Task {i} ({}): on_success '{}' must be one of {} or a valid task name",
                    task.name,
                    task.on_success,
                    ON_SUCCESS_ACTIONS.join(", ")
                ));
            }

            if !ON_FAILURE_ACTIONS.contains(&task.on_failure.as_str())
                && !task_names.contains(&task.on_failure.as_str())
            {
                errors.push(format!(
                    "Task {i} ({}): on_failure '{}' must be one of {} or a valid task name",
                    task.name,
                    task.on_failure,
                    ON_FAILURE_ACTIONS.join(", ")
                ));
            }

            if task.max_attempts < 1 {
                errors.push(format!("Task {i} ({}): max_attempts must be >= 1", task.name));
            }
        }

        if self.has_dependencies() {
            for task in &self.tasks {
                for dep in &task.depends_on {
                    if !task_names.contains(&dep.as_str()) {
                        errors.push(format!(
                            "Task '{}' depends on unknown task '{dep}'",
                            task.name
                        ));
                    }
                }
            }

            match self.build_task_graph() {
                Ok(_) => {}
                Err(e @ GraphError::CycleDetected(_)) => {
                    errors.push(format!("Circular dependency detected: {e}"));
                }
                Err(e) => {
                    errors.push(format!("Invalid dependency configuration: {e}"));
                }
            }
        }

        debug!(errors = errors.len(), "Configuration validation complete");
        errors
    }

    /// Build and validate the dependency graph over all tasks
    pub fn build_task_graph(&self) -> Result<TaskGraph, GraphError> {
        let mut graph = TaskGraph::new();
        for task in &self.tasks {
            graph.add_task(&task.name, &task.depends_on)?;
        }
        graph.validate()?;
        Ok(graph)
    }
}
