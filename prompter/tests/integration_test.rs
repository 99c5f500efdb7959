//! Integration tests for prompter
//!
//! These drive the library end-to-end with a scripted assistant stub and
//! real `sh -c` verification commands.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use prompter::agent::{AgentClient, AgentError, AgentResponse, PromptRequest};
use prompter::config::{Settings, TaskSpec, WorkflowConfig};
use prompter::coordinator::{ParallelCoordinator, TaskStatus};
use prompter::executor::TaskExecutor;
use prompter::orchestrator::{run_workflow, RuntimeOptions};
use prompter::progress::{NullObserver, ProgressMode, ProgressObserver};
use prompter::sequential::SequentialEngine;
use prompter::state::{StateStore, TaskState};

// =============================================================================
// Test helpers
// =============================================================================

/// Assistant stub: sleeps briefly, records the prompts it saw
struct StubAgent {
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl StubAgent {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn executed(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentClient for StubAgent {
    async fn run_prompt(&self, request: PromptRequest) -> Result<AgentResponse, AgentError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        tokio::time::sleep(self.delay).await;
        Ok(AgentResponse {
            output: format!("ran: {}", request.prompt),
            session_id: Some(format!("session-{}", request.prompt)),
        })
    }
}

/// Observer that appends every transition to a shared log
struct RecordingObserver {
    events: Mutex<Vec<(String, TaskStatus)>>,
}

impl RecordingObserver {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<(String, TaskStatus)> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn update(&self, task_name: &str, status: TaskStatus, _message: Option<&str>, _error: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push((task_name.to_string(), status));
    }
}

/// Replay an event log, tracking which tasks were concurrently running at
/// each `Running` transition
fn running_sets_at_each_start(events: &[(String, TaskStatus)]) -> Vec<(String, HashSet<String>)> {
    let mut running: HashSet<String> = HashSet::new();
    let mut sets = Vec::new();

    for (name, status) in events {
        match status {
            TaskStatus::Running => {
                running.insert(name.clone());
                sets.push((name.clone(), running.clone()));
            }
            s if s.is_terminal() => {
                running.remove(name);
            }
            _ => {}
        }
    }
    sets
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

fn workflow(dir: &Path, tasks: Vec<TaskSpec>, max_parallel: usize) -> Arc<WorkflowConfig> {
    Arc::new(WorkflowConfig {
        config_path: dir.join("workflow.toml"),
        settings: Settings {
            check_interval: 0,
            max_parallel_tasks: max_parallel,
            working_directory: Some(dir.display().to_string()),
            ..Default::default()
        },
        tasks,
    })
}

async fn build_coordinator(
    dir: &Path,
    tasks: Vec<TaskSpec>,
    max_parallel: usize,
    agent: Arc<StubAgent>,
    observer: Arc<dyn ProgressObserver>,
) -> (Arc<ParallelCoordinator>, Arc<StateStore>) {
    let config = workflow(dir, tasks, max_parallel);
    let state = Arc::new(StateStore::load(dir.join("state.json")).await);
    let executor = Arc::new(TaskExecutor::new(agent, state.clone(), &config, false));
    let coordinator =
        Arc::new(ParallelCoordinator::new(config, executor, state.clone(), observer).unwrap());
    (coordinator, state)
}

// =============================================================================
// Scenario: diamond dependency graph
// =============================================================================

#[tokio::test]
async fn test_diamond_workflow() {
    let temp = tempdir().unwrap();
    let tasks = vec![
        spec("A", "true", &[]),
        spec("B", "true", &["A"]),
        spec("C", "true", &["A"]),
        spec("D", "true", &["B", "C"]),
    ];

    // The graph itself reports the expected levels.
    let config = workflow(temp.path(), tasks.clone(), 3);
    let graph = config.build_task_graph().unwrap();
    assert_eq!(
        graph.execution_levels(),
        vec![
            vec!["A".to_string()],
            vec!["B".to_string(), "C".to_string()],
            vec!["D".to_string()],
        ]
    );

    let observer = Arc::new(RecordingObserver::new());
    let agent = Arc::new(StubAgent::new(Duration::from_millis(30)));
    let (coordinator, state) =
        build_coordinator(temp.path(), tasks, 3, agent, observer.clone()).await;

    let results = coordinator.execute_all().await;

    assert_eq!(results.len(), 4);
    assert!(results.values().all(|r| r.success));
    assert_eq!(state.get_completed().await, vec!["A", "B", "C", "D"]);

    // Observed running order obeys the dependency edges.
    let events = observer.events();
    let completed = |n: &str| {
        events
            .iter()
            .position(|(name, s)| name == n && *s == TaskStatus::Completed)
            .unwrap()
    };
    let running = |n: &str| {
        events
            .iter()
            .position(|(name, s)| name == n && *s == TaskStatus::Running)
            .unwrap()
    };
    assert!(completed("A") < running("B"));
    assert!(completed("A") < running("C"));
    assert!(completed("B") < running("D"));
    assert!(completed("C") < running("D"));
}

// =============================================================================
// Scenario: failure skips dependents, independent tasks continue
// =============================================================================

#[tokio::test]
async fn test_skip_on_failure_end_to_end() {
    let temp = tempdir().unwrap();
    let tasks = vec![
        spec("A", "false", &[]),
        spec("B", "true", &["A"]),
        spec("C", "true", &[]),
    ];

    let config = workflow(temp.path(), tasks, 3);
    let state = Arc::new(StateStore::load(temp.path().join("state.json")).await);
    let agent: Arc<dyn AgentClient> = Arc::new(StubAgent::new(Duration::from_millis(10)));

    let code = run_workflow(
        config.as_ref().clone(),
        state.clone(),
        agent,
        RuntimeOptions {
            progress_mode: ProgressMode::None,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(code, 1);
    assert_eq!(state.get_failed().await, vec!["A"]);
    assert_eq!(state.get_completed().await, vec!["C"]);
    // B was skipped: it never reached the store.
    assert!(state.get_state("B").await.is_none());
}

#[tokio::test]
async fn test_skipped_task_never_runs() {
    let temp = tempdir().unwrap();
    let tasks = vec![spec("A", "false", &[]), spec("B", "true", &["A"])];

    let observer = Arc::new(RecordingObserver::new());
    let agent = Arc::new(StubAgent::new(Duration::from_millis(10)));
    let (coordinator, _state) =
        build_coordinator(temp.path(), tasks, 3, agent.clone(), observer.clone()).await;

    coordinator.execute_all().await;

    assert_eq!(agent.executed(), vec!["A"]);
    let statuses = coordinator.execution_statuses().await;
    assert_eq!(statuses["B"], TaskStatus::Skipped);
    assert!(!observer
        .events()
        .iter()
        .any(|(n, s)| n == "B" && *s == TaskStatus::Running));
}

// =============================================================================
// Scenario: exclusive task and the parallel cap
// =============================================================================

#[tokio::test]
async fn test_exclusive_task_runs_alone() {
    let temp = tempdir().unwrap();
    let mut t3 = spec("t3", "true", &[]);
    t3.exclusive = true;
    let tasks = vec![
        spec("t1", "true", &[]),
        spec("t2", "true", &[]),
        t3,
        spec("t4", "true", &[]),
    ];

    let observer = Arc::new(RecordingObserver::new());
    let agent = Arc::new(StubAgent::new(Duration::from_millis(40)));
    let (coordinator, state) =
        build_coordinator(temp.path(), tasks, 3, agent, observer.clone()).await;

    coordinator.execute_all().await;

    assert_eq!(state.get_completed().await, vec!["t1", "t2", "t3", "t4"]);

    for (started, running) in running_sets_at_each_start(&observer.events()) {
        if running.contains("t3") {
            assert_eq!(
                running.len(),
                1,
                "t3 is exclusive but ran alongside {running:?}"
            );
        } else {
            assert!(
                running.len() <= 3,
                "parallel cap exceeded when {started} started: {running:?}"
            );
        }
    }
}

#[tokio::test]
async fn test_bounded_concurrency() {
    let temp = tempdir().unwrap();
    let tasks: Vec<TaskSpec> = (1..=6)
        .map(|i| spec(&format!("t{i}"), "true", &[]))
        .collect();

    let observer = Arc::new(RecordingObserver::new());
    let agent = Arc::new(StubAgent::new(Duration::from_millis(40)));
    let (coordinator, state) =
        build_coordinator(temp.path(), tasks, 2, agent, observer.clone()).await;

    coordinator.execute_all().await;

    assert_eq!(state.get_completed().await.len(), 6);
    for (started, running) in running_sets_at_each_start(&observer.events()) {
        assert!(
            running.len() <= 2,
            "more than 2 tasks running when {started} started: {running:?}"
        );
    }
}

// =============================================================================
// Scenario: sequential jump and repeat
// =============================================================================

#[tokio::test]
async fn test_sequential_jump_skips_middle_task() {
    let temp = tempdir().unwrap();
    let mut a = spec("a", "true", &[]);
    a.on_success = "c".to_string();
    let b = spec("b", "true", &[]);
    let mut c = spec("c", "true", &[]);
    c.on_success = "stop".to_string();

    let tasks = vec![a, b, c];
    let config = workflow(temp.path(), tasks.clone(), 4);
    let state = Arc::new(StateStore::load(temp.path().join("state.json")).await);
    let agent = Arc::new(StubAgent::new(Duration::ZERO));
    let executor = Arc::new(TaskExecutor::new(agent.clone(), state.clone(), &config, false));

    let engine = SequentialEngine::new(config, executor, state.clone(), false);
    engine.run(tasks).await.unwrap();

    assert_eq!(agent.executed(), vec!["a", "c"]);
    assert_eq!(state.get_completed().await, vec!["a", "c"]);
    assert!(state.get_state("b").await.is_none());
}

// =============================================================================
// Scenario: session ids persist and can be resumed
// =============================================================================

#[tokio::test]
async fn test_session_id_survives_for_resume() {
    let temp = tempdir().unwrap();
    let state_path = temp.path().join("state.json");

    let tasks = vec![spec("build", "true", &[])];
    {
        let config = workflow(temp.path(), tasks.clone(), 4);
        let state = Arc::new(StateStore::load(&state_path).await);
        let agent = Arc::new(StubAgent::new(Duration::ZERO));
        let executor = Arc::new(TaskExecutor::new(agent, state.clone(), &config, false));
        let engine = SequentialEngine::new(config, executor, state, false);
        engine.run(tasks).await.unwrap();
    }

    // A fresh process sees the recorded assistant session.
    let state = StateStore::load(&state_path).await;
    assert_eq!(
        state.get_previous_session_id("build").await,
        Some("session-build".to_string())
    );
}

// =============================================================================
// Scenario: state recovery across interrupted runs
// =============================================================================

#[tokio::test]
async fn test_state_recovery_after_partial_run() {
    let temp = tempdir().unwrap();
    let state_path = temp.path().join("state.json");

    // First "process": three of five tasks complete before the interruption.
    {
        let store = StateStore::load(&state_path).await;
        for name in ["t1", "t2", "t3"] {
            store.mark_running(name).await;
            store
                .update(&prompter::TaskResult {
                    task_name: name.to_string(),
                    success: true,
                    output: "done".to_string(),
                    error: String::new(),
                    verification_output: String::new(),
                    attempts: 1,
                    timestamp: chrono::Utc::now(),
                    session_id: None,
                })
                .await;
        }
    }

    // Restarted process reads the completed work back.
    let store = StateStore::load(&state_path).await;
    let completed = store.get_completed().await;
    assert_eq!(completed, vec!["t1", "t2", "t3"]);

    // A caller filtering by state can decide not to re-run them.
    let all: Vec<String> = (1..=5).map(|i| format!("t{i}")).collect();
    let completed_set: HashSet<String> = completed.into_iter().collect();
    let remaining: Vec<&String> = all.iter().filter(|t| !completed_set.contains(*t)).collect();
    assert_eq!(remaining, vec!["t4", "t5"]);

    for name in ["t1", "t2", "t3"] {
        let record = store.get_state(name).await.unwrap();
        assert_eq!(record.status, TaskState::Completed);
        assert!(record.last_success.is_some());
    }
}

// =============================================================================
// Scenario: whole-workflow exit codes through run_workflow
// =============================================================================

#[tokio::test]
async fn test_clean_run_exits_zero() {
    let temp = tempdir().unwrap();
    let tasks = vec![
        spec("a", "true", &[]),
        spec("b", "true", &["a"]),
    ];
    let config = workflow(temp.path(), tasks, 4);
    let state = Arc::new(StateStore::load(temp.path().join("state.json")).await);
    let agent: Arc<dyn AgentClient> = Arc::new(StubAgent::new(Duration::from_millis(5)));

    let code = run_workflow(
        config.as_ref().clone(),
        state,
        agent,
        RuntimeOptions {
            progress_mode: ProgressMode::None,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(code, 0);
}

#[tokio::test]
async fn test_results_match_statuses() {
    let temp = tempdir().unwrap();
    let tasks = vec![
        spec("ok", "true", &[]),
        spec("bad", "false", &[]),
        spec("downstream", "true", &["bad"]),
    ];

    let agent = Arc::new(StubAgent::new(Duration::from_millis(5)));
    let (coordinator, _state) =
        build_coordinator(temp.path(), tasks, 4, agent, Arc::new(NullObserver)).await;

    let results = coordinator.execute_all().await;
    let statuses = coordinator.execution_statuses().await;

    let expected: HashMap<&str, TaskStatus> = [
        ("ok", TaskStatus::Completed),
        ("bad", TaskStatus::Failed),
        ("downstream", TaskStatus::Skipped),
    ]
    .into();

    for (name, status) in expected {
        assert_eq!(statuses[name], status, "status of {name}");
    }

    assert!(results["ok"].success);
    assert!(!results["bad"].success);
    assert!(!results.contains_key("downstream"));
}
