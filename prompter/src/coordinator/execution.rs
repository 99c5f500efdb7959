//! Per-task execution tracking

use std::time::{Duration, Instant};

use crate::executor::TaskResult;

/// Status of a task in the parallel execution system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    /// Whether the task can no longer change status
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// Coordinator-local execution state for one task
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub name: String,
    pub status: TaskStatus,
    pub result: Option<TaskResult>,
    pub start_time: Option<Instant>,
    pub end_time: Option<Instant>,
    pub dependencies_met: bool,
}

impl ExecutionState {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: TaskStatus::Pending,
            result: None,
            start_time: None,
            end_time: None,
            dependencies_met: false,
        }
    }

    /// Wall-clock execution time, once both endpoints are known
    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Skipped.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Ready.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn test_duration_requires_both_endpoints() {
        let mut state = ExecutionState::new("task");
        assert!(state.duration().is_none());

        state.start_time = Some(Instant::now());
        assert!(state.duration().is_none());

        state.end_time = Some(Instant::now());
        assert!(state.duration().is_some());
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskStatus::Skipped.to_string(), "skipped");
        assert_eq!(TaskStatus::Running.to_string(), "running");
    }
}
