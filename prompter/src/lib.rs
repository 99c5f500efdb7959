//! prompter - workflow orchestrator for AI-assisted coding tasks
//!
//! A workflow is a list of tasks, each pairing a prompt for an external AI
//! coding assistant with a shell command that verifies the prompt's effect.
//! Tasks without `depends_on` edges run through the sequential engine, which
//! supports jump/repeat/stop control flow; workflows with dependencies form
//! a DAG and run concurrently under a bounded-parallelism coordinator.
//! Outcomes persist in a crash-safe JSON state file between invocations.
//!
//! # Modules
//!
//! - [`config`] - workflow file parsing and validation
//! - [`graph`] - dependency DAG: cycle detection, topological order, levels
//! - [`agent`] - assistant invocation behind the [`agent::AgentClient`] trait
//! - [`executor`] - per-task attempt loop and verification
//! - [`state`] - durable state store
//! - [`coordinator`] - bounded-parallelism DAG scheduler
//! - [`sequential`] - linear engine with task jumping
//! - [`progress`] - observer trait and terminal renderer
//! - [`orchestrator`] - mode selection and exit status

pub mod agent;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod executor;
pub mod graph;
pub mod init;
pub mod orchestrator;
pub mod progress;
pub mod sequential;
pub mod state;

// Re-export commonly used types
pub use agent::{AgentClient, AgentError, AgentResponse, ClaudeCliClient, PromptRequest};
pub use config::{ConfigError, Settings, TaskSpec, WorkflowConfig, RESERVED_ACTIONS};
pub use coordinator::{ExecutionState, ParallelCoordinator, ResourcePool, TaskStatus};
pub use executor::{TaskExecutor, TaskResult};
pub use graph::{GraphError, GraphNode, TaskGraph};
pub use orchestrator::{run_workflow, RuntimeOptions};
pub use progress::{NullObserver, ProgressDisplay, ProgressMode, ProgressObserver};
pub use sequential::{EngineError, SequentialEngine, MAX_TASK_ITERATIONS};
pub use state::{StateSnapshot, StateStore, TaskState, TaskStateRecord};
