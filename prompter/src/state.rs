//! Persistent task state
//!
//! The [`StateStore`] keeps per-task status, attempt counts, and an
//! append-only history of results, mirrored to a JSON file after every
//! mutation. Writes go through a temporary file and an atomic rename so a
//! crash can never leave a half-written state file. Loading tolerates both a
//! missing file (fresh state) and a malformed one (warn and start empty).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::executor::TaskResult;

/// Byte ceiling applied to output/error text in history entries
const HISTORY_TRUNCATE_BYTES: usize = 500;

/// Persisted status of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Mutable per-task record, persisted in the snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStateRecord {
    pub name: String,
    #[serde(default)]
    pub status: TaskState,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: String,
}

impl TaskStateRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: TaskState::Pending,
            attempts: 0,
            last_attempt: None,
            last_success: None,
            error_message: String::new(),
        }
    }
}

/// One completed attempt-batch, truncated for storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Process session that produced this entry
    pub session_id: String,
    pub task_name: String,
    pub success: bool,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
    pub output: String,
    pub error: String,
    /// Assistant conversation id, when the invocation reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_session_id: Option<String>,
}

/// On-disk form of the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub task_states: Vec<TaskStateRecord>,
    #[serde(default)]
    pub results_history: Vec<HistoryEntry>,
}

/// Aggregate counts for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct StateSummary {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub total_tasks: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
    pub pending: usize,
    pub total_results: usize,
}

struct StoreInner {
    task_states: HashMap<String, TaskStateRecord>,
    results_history: Vec<HistoryEntry>,
}

/// Durable state store, safe to share across workers
///
/// All access goes through the interior mutex, so concurrent state writes
/// never interleave.
pub struct StateStore {
    path: PathBuf,
    session_id: String,
    start_time: DateTime<Utc>,
    inner: Mutex<StoreInner>,
}

impl StateStore {
    /// Open a store backed by `path`, loading any existing state
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(path = %path.display(), "StateStore::load: called");

        let mut task_states = HashMap::new();
        let mut results_history = Vec::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<StateSnapshot>(&contents) {
                Ok(snapshot) => {
                    debug!("StateStore::load: parsed existing snapshot");
                    for record in snapshot.task_states {
                        task_states.insert(record.name.clone(), record);
                    }
                    results_history = snapshot.results_history;
                    debug!(
                        path = %path.display(),
                        tasks = task_states.len(),
                        results = results_history.len(),
                        "StateStore::load: loaded existing state"
                    );
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not parse state file, starting fresh");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "StateStore::load: no state file, starting fresh");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read state file, starting fresh");
            }
        }

        Self {
            path,
            session_id: Uuid::now_v7().to_string(),
            start_time: Utc::now(),
            inner: Mutex::new(StoreInner {
                task_states,
                results_history,
            }),
        }
    }

    /// Per-process session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mark a task as currently running
    pub async fn mark_running(&self, task_name: &str) {
        debug!(task = %task_name, "StateStore::mark_running: called");
        let mut inner = self.inner.lock().await;
        inner
            .task_states
            .entry(task_name.to_string())
            .or_insert_with(|| TaskStateRecord::new(task_name))
            .status = TaskState::Running;
        debug!(task = %task_name, "StateStore::mark_running: status set to running");
        self.save(&inner).await;
    }

    /// Fold an execution result into the task's record and the history
    pub async fn update(&self, result: &TaskResult) {
        debug!(task = %result.task_name, success = result.success, "StateStore::update: called");
        let mut inner = self.inner.lock().await;

        let record = inner
            .task_states
            .entry(result.task_name.clone())
            .or_insert_with(|| TaskStateRecord::new(&result.task_name));

        record.attempts = result.attempts;
        record.last_attempt = Some(result.timestamp);
        if result.success {
            debug!(task = %result.task_name, "StateStore::update: marking completed");
            record.status = TaskState::Completed;
            record.last_success = Some(result.timestamp);
            record.error_message.clear();
        } else {
            debug!(task = %result.task_name, "StateStore::update: marking failed");
            record.status = TaskState::Failed;
            record.error_message = result.error.clone();
        }

        let entry = HistoryEntry {
            session_id: self.session_id.clone(),
            task_name: result.task_name.clone(),
            success: result.success,
            attempts: result.attempts,
            timestamp: result.timestamp,
            output: truncate_utf8(&result.output, HISTORY_TRUNCATE_BYTES),
            error: truncate_utf8(&result.error, HISTORY_TRUNCATE_BYTES),
            task_session_id: result.session_id.clone(),
        };
        inner.results_history.push(entry);
        debug!(
            task = %result.task_name,
            history_len = inner.results_history.len(),
            "StateStore::update: appended history entry"
        );

        self.save(&inner).await;
    }

    pub async fn get_state(&self, task_name: &str) -> Option<TaskStateRecord> {
        debug!(task = %task_name, "StateStore::get_state: called");
        let inner = self.inner.lock().await;
        inner.task_states.get(task_name).cloned()
    }

    /// Names of tasks currently recorded as failed
    pub async fn get_failed(&self) -> Vec<String> {
        self.names_with_status(TaskState::Failed).await
    }

    /// Names of tasks currently recorded as completed
    pub async fn get_completed(&self) -> Vec<String> {
        self.names_with_status(TaskState::Completed).await
    }

    async fn names_with_status(&self, status: TaskState) -> Vec<String> {
        debug!(%status, "StateStore::names_with_status: called");
        let inner = self.inner.lock().await;
        let mut names: Vec<String> = inner
            .task_states
            .values()
            .filter(|r| r.status == status)
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        debug!(%status, count = names.len(), "StateStore::names_with_status: returning names");
        names
    }

    pub async fn get_summary(&self) -> StateSummary {
        debug!("StateStore::get_summary: called");
        let inner = self.inner.lock().await;
        let count = |status: TaskState| inner.task_states.values().filter(|r| r.status == status).count();

        StateSummary {
            session_id: self.session_id.clone(),
            start_time: self.start_time,
            total_tasks: inner.task_states.len(),
            completed: count(TaskState::Completed),
            failed: count(TaskState::Failed),
            running: count(TaskState::Running),
            pending: count(TaskState::Pending),
            total_results: inner.results_history.len(),
        }
    }

    /// The most recent non-empty assistant session id recorded for a task
    pub async fn get_previous_session_id(&self, task_name: &str) -> Option<String> {
        debug!(task = %task_name, "StateStore::get_previous_session_id: called");
        let inner = self.inner.lock().await;
        let session_id = inner
            .results_history
            .iter()
            .rev()
            .filter(|entry| entry.task_name == task_name)
            .find_map(|entry| {
                entry
                    .task_session_id
                    .as_ref()
                    .filter(|id| !id.is_empty())
                    .cloned()
            });
        if session_id.is_some() {
            debug!(task = %task_name, "StateStore::get_previous_session_id: found recorded session");
        } else {
            debug!(task = %task_name, "StateStore::get_previous_session_id: no session recorded");
        }
        session_id
    }

    /// Current in-memory view, as it would be written to disk
    pub async fn snapshot(&self) -> StateSnapshot {
        debug!("StateStore::snapshot: called");
        let inner = self.inner.lock().await;
        self.build_snapshot(&inner)
    }

    /// Drop all recorded state and remove the backing file
    pub async fn clear(&self) {
        debug!(path = %self.path.display(), "StateStore::clear: called");
        let mut inner = self.inner.lock().await;
        inner.task_states.clear();
        inner.results_history.clear();
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("StateStore::clear: state file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("StateStore::clear: state file did not exist");
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not remove state file");
            }
        }
    }

    fn build_snapshot(&self, inner: &StoreInner) -> StateSnapshot {
        debug!(tasks = inner.task_states.len(), "StateStore::build_snapshot: called");
        let mut task_states: Vec<TaskStateRecord> = inner.task_states.values().cloned().collect();
        task_states.sort_by(|a, b| a.name.cmp(&b.name));

        StateSnapshot {
            session_id: self.session_id.clone(),
            start_time: self.start_time,
            last_update: Utc::now(),
            task_states,
            results_history: inner.results_history.clone(),
        }
    }

    /// Write-then-rename so the file on disk is always a complete snapshot.
    /// Save failures are logged and otherwise ignored; a run is never aborted
    /// because the state file could not be written.
    async fn save(&self, inner: &StoreInner) {
        debug!(path = %self.path.display(), "StateStore::save: called");
        let snapshot = self.build_snapshot(inner);

        let contents = match serde_json::to_string_pretty(&snapshot) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "Could not serialize state");
                return;
            }
        };

        let tmp_path = self.path.with_extension("json.tmp");
        debug!(path = %tmp_path.display(), "StateStore::save: writing temporary file");
        if let Err(e) = tokio::fs::write(&tmp_path, &contents).await {
            warn!(path = %tmp_path.display(), error = %e, "Could not write state file");
            return;
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            warn!(path = %self.path.display(), error = %e, "Could not replace state file");
        } else {
            debug!(path = %self.path.display(), "StateStore::save: state file replaced");
        }
    }
}

/// Truncate to at most `max` bytes without splitting a UTF-8 code point
fn truncate_utf8(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
