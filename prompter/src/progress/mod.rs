//! Progress observation and rendering
//!
//! The engines report task transitions through the [`ProgressObserver`]
//! trait and never wait on the renderer. The bundled terminal renderer has
//! three modes; rich output downgrades automatically on CI machines and
//! non-interactive stdout.

use std::io::IsTerminal;

use crate::coordinator::TaskStatus;

mod display;

pub use display::ProgressDisplay;

/// Environment variable forcing a renderer mode
pub const PROGRESS_MODE_ENV: &str = "PROMPTER_PROGRESS_MODE";

/// Environment variables that indicate a CI machine
const CI_ENV_VARS: [&str; 7] = [
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "TEAMCITY_VERSION",
];

/// Receives task state-change events
///
/// Implementations must tolerate concurrent calls from workers and the
/// scheduler, and repeated delivery of the same transition.
pub trait ProgressObserver: Send + Sync {
    fn update(&self, task_name: &str, status: TaskStatus, message: Option<&str>, error: Option<&str>);
}

/// Observer that discards everything
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn update(&self, _task_name: &str, _status: TaskStatus, _message: Option<&str>, _error: Option<&str>) {}
}

/// Renderer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressMode {
    /// Live status line, redrawn in place
    #[default]
    Rich,
    /// One line per transition
    Simple,
    /// No output
    None,
}

impl std::str::FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rich" => Ok(Self::Rich),
            "simple" => Ok(Self::Simple),
            "none" => Ok(Self::None),
            _ => Err(format!("Unknown progress mode: {s}. Use: rich, simple, or none")),
        }
    }
}

impl ProgressMode {
    /// Apply the environment override and terminal-capability downgrade
    pub fn resolve(self) -> Self {
        if let Ok(forced) = std::env::var(PROGRESS_MODE_ENV) {
            if let Ok(mode) = forced.parse() {
                return mode;
            }
        }

        if self == Self::Rich && !supports_rich_display() {
            return Self::Simple;
        }
        self
    }
}

fn supports_rich_display() -> bool {
    if CI_ENV_VARS.iter().any(|v| std::env::var_os(v).is_some()) {
        return false;
    }
    std::io::stdout().is_terminal()
}
