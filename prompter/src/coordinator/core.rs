//! Coordinator implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::{TaskSpec, WorkflowConfig};
use crate::executor::{TaskExecutor, TaskResult};
use crate::graph::{GraphError, TaskGraph};
use crate::progress::ProgressObserver;
use crate::state::StateStore;

use super::execution::{ExecutionState, TaskStatus};
use super::pool::ResourcePool;

/// How long the scheduler sleeps between readiness checks when no
/// completion signal arrives
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// State shared between the scheduler loop and workers
struct CoordinatorInner {
    exec_states: HashMap<String, ExecutionState>,
    pool: ResourcePool,
}

/// Coordinates parallel execution of tasks with dependency management
pub struct ParallelCoordinator {
    config: Arc<WorkflowConfig>,
    graph: TaskGraph,
    executor: Arc<TaskExecutor>,
    state: Arc<StateStore>,
    observer: Arc<dyn ProgressObserver>,
    inner: Mutex<CoordinatorInner>,
    task_completed: Notify,
    shutdown_requested: AtomicBool,
}

impl ParallelCoordinator {
    /// Build a coordinator over the config's dependency graph
    pub fn new(
        config: Arc<WorkflowConfig>,
        executor: Arc<TaskExecutor>,
        state: Arc<StateStore>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<Self, GraphError> {
        debug!(
            tasks = config.tasks.len(),
            max_parallel = config.settings.max_parallel_tasks,
            "ParallelCoordinator::new: called"
        );
        let graph = config.build_task_graph()?;
        debug!("ParallelCoordinator::new: dependency graph validated");

        let exec_states = config
            .tasks
            .iter()
            .map(|task| (task.name.clone(), ExecutionState::new(&task.name)))
            .collect();

        let pool = ResourcePool::new(config.settings.max_parallel_tasks);

        Ok(Self {
            config,
            graph,
            executor,
            state,
            observer,
            inner: Mutex::new(CoordinatorInner { exec_states, pool }),
            task_completed: Notify::new(),
            shutdown_requested: AtomicBool::new(false),
        })
    }

    /// Execute all tasks respecting dependencies and the parallel cap
    ///
    /// Returns the result of every task that actually ran; skipped tasks
    /// have no result.
    pub async fn execute_all(self: &Arc<Self>) -> HashMap<String, TaskResult> {
        debug!("ParallelCoordinator::execute_all: called");
        info!(
            tasks = self.config.tasks.len(),
            max_parallel = self.config.settings.max_parallel_tasks,
            "Starting parallel execution"
        );
        info!("\n{}", self.graph.visualize_ascii());

        for task in &self.config.tasks {
            self.observer.update(&task.name, TaskStatus::Pending, None, None);
        }

        let started = Instant::now();
        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        loop {
            if self.shutdown_requested.load(Ordering::SeqCst) {
                debug!("Shutdown flag set, scheduler exiting");
                break;
            }

            let mut to_launch: Vec<TaskSpec> = Vec::new();
            {
                let mut inner = self.inner.lock().await;
                let ready = self.refresh_ready(&mut inner);

                if ready.is_empty() && inner.pool.running_tasks.is_empty() {
                    debug!("No ready or running tasks, scheduler finishing");
                    break;
                }

                for name in ready {
                    let Some(task) = self.config.get_task(&name) else {
                        continue;
                    };
                    if inner.pool.can_schedule(task) {
                        debug!(task = %name, "Scheduling task");
                        inner.pool.allocate(task);
                        let entry = inner
                            .exec_states
                            .get_mut(&name)
                            .expect("execution state exists for every task");
                        entry.status = TaskStatus::Running;
                        entry.start_time = Some(Instant::now());
                        to_launch.push(task.clone());
                    }
                }
            }

            for task in to_launch {
                debug!(task = %task.name, "ParallelCoordinator::execute_all: launching worker");
                self.observer
                    .update(&task.name, TaskStatus::Running, Some("Starting..."), None);
                let coordinator = Arc::clone(self);
                workers.push(tokio::spawn(async move {
                    coordinator.run_worker(task).await;
                }));
            }

            tokio::select! {
                _ = self.task_completed.notified() => {}
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }

        // In-flight workers finish on their own; shutdown never preempts.
        debug!(workers = workers.len(), "ParallelCoordinator::execute_all: joining workers");
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Worker task panicked");
            }
        }

        let inner = self.inner.lock().await;
        info!(
            elapsed = ?started.elapsed(),
            completed = inner.pool.completed_tasks.len(),
            failed = inner.pool.failed_tasks.len(),
            "Parallel execution finished"
        );

        inner
            .exec_states
            .iter()
            .filter_map(|(name, state)| state.result.clone().map(|r| (name.clone(), r)))
            .collect()
    }

    /// Promote pending tasks whose dependencies completed and skip the
    /// dependents of failures, then return the ready set in config order
    fn refresh_ready(&self, inner: &mut CoordinatorInner) -> Vec<String> {
        debug!(
            running = inner.pool.running_tasks.len(),
            "ParallelCoordinator::refresh_ready: called"
        );

        // Skips cascade (a skipped dependency skips its dependents), so
        // propagate them to a fixpoint before collecting the ready set.
        loop {
            let mut changed = false;

            for task in &self.config.tasks {
                let status = inner.exec_states[&task.name].status;
                if status != TaskStatus::Pending {
                    continue;
                }

                let dep_failed = task.depends_on.iter().any(|dep| {
                    matches!(
                        inner.exec_states.get(dep).map(|s| s.status),
                        Some(TaskStatus::Failed) | Some(TaskStatus::Skipped)
                    )
                });

                if dep_failed {
                    debug!(task = %task.name, "ParallelCoordinator::refresh_ready: dependency failed, skipping");
                    let entry = inner
                        .exec_states
                        .get_mut(&task.name)
                        .expect("execution state exists for every task");
                    entry.status = TaskStatus::Skipped;
                    entry.end_time = Some(Instant::now());
                    info!(task = %task.name, "Skipping task due to failed dependencies");
                    self.observer.update(
                        &task.name,
                        TaskStatus::Skipped,
                        Some("Skipped (dependency failed)"),
                        None,
                    );
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        let mut ready = Vec::new();
        for task in &self.config.tasks {
            match inner.exec_states[&task.name].status {
                TaskStatus::Ready => ready.push(task.name.clone()),
                TaskStatus::Pending => {
                    let deps_completed = task.depends_on.iter().all(|dep| {
                        inner.exec_states.get(dep).map(|s| s.status) == Some(TaskStatus::Completed)
                    });
                    if deps_completed {
                        debug!(task = %task.name, "ParallelCoordinator::refresh_ready: dependencies met, marking ready");
                        let entry = inner
                            .exec_states
                            .get_mut(&task.name)
                            .expect("execution state exists for every task");
                        entry.status = TaskStatus::Ready;
                        entry.dependencies_met = true;
                        self.observer
                            .update(&task.name, TaskStatus::Ready, Some("Ready to run"), None);
                        ready.push(task.name.clone());
                    }
                }
                _ => {}
            }
        }
        debug!(count = ready.len(), "ParallelCoordinator::refresh_ready: returning ready set");
        ready
    }

    /// Run one task on the worker pool and record its outcome
    async fn run_worker(self: Arc<Self>, task: TaskSpec) {
        debug!(task = %task.name, "ParallelCoordinator::run_worker: called");
        info!(task = %task.name, "Starting execution");

        self.state.mark_running(&task.name).await;
        self.observer
            .update(&task.name, TaskStatus::Running, Some("Executing prompt..."), None);

        let result = self.executor.run_task(&task).await;
        let success = result.success;
        let error_text = result.error.clone();
        let session = result.session_id.clone();
        debug!(task = %task.name, success, "ParallelCoordinator::run_worker: executor returned");

        // Persist before flipping the in-memory status: a dependent can only
        // be scheduled once this task reads completed, so the dependency's
        // final state write precedes the dependent's first.
        self.state.update(&result).await;

        {
            let mut inner = self.inner.lock().await;
            let entry = inner
                .exec_states
                .get_mut(&task.name)
                .expect("execution state exists for every task");
            entry.end_time = Some(Instant::now());
            entry.status = if success {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            };
            let elapsed = entry.duration().unwrap_or_default();
            entry.result = Some(result);

            if success {
                info!(task = %task.name, elapsed = ?elapsed, session = ?session, "Task completed");
            } else {
                error!(task = %task.name, error = %error_text, "Task failed");
            }
        }

        if success {
            self.observer
                .update(&task.name, TaskStatus::Completed, Some("Complete"), None);
        } else {
            let head: String = error_text.chars().take(50).collect();
            self.observer
                .update(&task.name, TaskStatus::Failed, Some("Failed"), Some(&head));
        }

        {
            let mut inner = self.inner.lock().await;
            inner.pool.release(&task, success);
            debug!(
                task = %task.name,
                running = inner.pool.running_tasks.len(),
                "ParallelCoordinator::run_worker: released pool slot"
            );
        }

        self.task_completed.notify_waiters();
        debug!(task = %task.name, "ParallelCoordinator::run_worker: signalled scheduler");
    }

    /// Request a graceful stop; running tasks finish, nothing new starts
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.task_completed.notify_waiters();
    }

    /// Final statuses of every task, for reporting and tests
    pub async fn execution_statuses(&self) -> HashMap<String, TaskStatus> {
        debug!("ParallelCoordinator::execution_statuses: called");
        let inner = self.inner.lock().await;
        inner
            .exec_states
            .iter()
            .map(|(name, state)| (name.clone(), state.status))
            .collect()
    }
}
