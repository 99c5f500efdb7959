//! Resource accounting for the scheduler

use std::collections::HashSet;

use crate::config::TaskSpec;

/// Tracks which tasks hold execution slots
///
/// Enforces exactly two constraints: the parallel cap, and the rule that an
/// exclusive task shares the pool with nothing. The per-task cpu/memory
/// hints are advisory and not accounted here.
#[derive(Debug)]
pub struct ResourcePool {
    max_parallel_tasks: usize,
    pub running_tasks: HashSet<String>,
    pub completed_tasks: HashSet<String>,
    pub failed_tasks: HashSet<String>,
    pub exclusive_task_running: Option<String>,
}

impl ResourcePool {
    pub fn new(max_parallel_tasks: usize) -> Self {
        Self {
            max_parallel_tasks,
            running_tasks: HashSet::new(),
            completed_tasks: HashSet::new(),
            failed_tasks: HashSet::new(),
            exclusive_task_running: None,
        }
    }

    /// Whether the task can be allocated right now
    pub fn can_schedule(&self, task: &TaskSpec) -> bool {
        if self.running_tasks.len() >= self.max_parallel_tasks {
            return false;
        }

        // While an exclusive task runs, nothing else is admitted.
        if self.exclusive_task_running.is_some() {
            return false;
        }

        // An exclusive task needs the pool to itself.
        !(task.exclusive && !self.running_tasks.is_empty())
    }

    pub fn allocate(&mut self, task: &TaskSpec) {
        self.running_tasks.insert(task.name.clone());
        if task.exclusive {
            self.exclusive_task_running = Some(task.name.clone());
        }
    }

    pub fn release(&mut self, task: &TaskSpec, success: bool) {
        self.running_tasks.remove(&task.name);
        if self.exclusive_task_running.as_deref() == Some(task.name.as_str()) {
            self.exclusive_task_running = None;
        }
        if success {
            self.completed_tasks.insert(task.name.clone());
        } else {
            self.failed_tasks.insert(task.name.clone());
        }
    }
}
