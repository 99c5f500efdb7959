//! Terminal progress renderer

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use colored::Colorize;

use crate::coordinator::TaskStatus;

use super::{ProgressMode, ProgressObserver};

struct DisplayState {
    statuses: HashMap<String, TaskStatus>,
    /// Width of the last in-place line, so redraws fully overwrite it
    last_width: usize,
}

/// Renders task progress to stdout
///
/// Rich mode keeps a single status line updated in place and prints a full
/// line for each finished task. Simple mode prints one line per transition.
pub struct ProgressDisplay {
    mode: ProgressMode,
    total_tasks: usize,
    workflow_name: String,
    inner: Mutex<DisplayState>,
}

impl ProgressDisplay {
    pub fn new(mode: ProgressMode, total_tasks: usize, workflow_name: impl Into<String>) -> Self {
        Self {
            mode,
            total_tasks,
            workflow_name: workflow_name.into(),
            inner: Mutex::new(DisplayState {
                statuses: HashMap::new(),
                last_width: 0,
            }),
        }
    }

    fn coloured_status(status: TaskStatus) -> String {
        let text = status.to_string();
        match status {
            TaskStatus::Completed => text.green().to_string(),
            TaskStatus::Failed => text.red().to_string(),
            TaskStatus::Skipped => text.yellow().to_string(),
            TaskStatus::Running => text.cyan().to_string(),
            _ => text,
        }
    }

    fn render_rich(&self, state: &mut DisplayState, task_name: &str, status: TaskStatus, message: Option<&str>) {
        if status.is_terminal() {
            // Clear the live line, then leave a permanent record.
            print!("\r{:width$}\r", "", width = state.last_width);
            state.last_width = 0;
            println!("  {task_name}: {}", Self::coloured_status(status));
        }

        let done = state.statuses.values().filter(|s| s.is_terminal()).count();
        let running: Vec<&str> = state
            .statuses
            .iter()
            .filter(|(_, s)| **s == TaskStatus::Running)
            .map(|(n, _)| n.as_str())
            .collect();

        if done >= self.total_tasks {
            print!("\r{:width$}\r", "", width = state.last_width);
            state.last_width = 0;
            let _ = std::io::stdout().flush();
            return;
        }

        let mut line = format!(
            "[{}] {done}/{} done",
            self.workflow_name, self.total_tasks
        );
        if !running.is_empty() {
            line.push_str(&format!(" | running: {}", running.join(", ")));
        }
        if let Some(message) = message {
            if !status.is_terminal() {
                line.push_str(&format!(" | {task_name}: {message}"));
            }
        }

        let width = line.chars().count();
        print!("\r{line:<pad$}", pad = state.last_width.max(width));
        state.last_width = width;
        let _ = std::io::stdout().flush();
    }

    fn render_simple(&self, task_name: &str, status: TaskStatus, message: Option<&str>, error: Option<&str>) {
        let mut line = format!("  {task_name}: {}", Self::coloured_status(status));
        if let Some(message) = message {
            line.push_str(&format!(" - {message}"));
        }
        if let Some(error) = error {
            line.push_str(&format!(" ({error})"));
        }
        println!("{line}");
    }
}

impl ProgressObserver for ProgressDisplay {
    fn update(&self, task_name: &str, status: TaskStatus, message: Option<&str>, error: Option<&str>) {
        if self.mode == ProgressMode::None {
            return;
        }

        let Ok(mut state) = self.inner.lock() else {
            return;
        };

        // Idempotent: re-delivery of the current status is a no-op.
        if state.statuses.get(task_name) == Some(&status) {
            return;
        }
        state.statuses.insert(task_name.to_string(), status);

        match self.mode {
            ProgressMode::Simple => self.render_simple(task_name, status, message, error),
            ProgressMode::Rich => self.render_rich(&mut state, task_name, status, message),
            ProgressMode::None => {}
        }
    }
}
