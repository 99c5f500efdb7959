//! Command-line interface definition

use std::path::PathBuf;

use clap::Parser;

use crate::progress::ProgressMode;

/// Orchestrates AI-assisted coding tasks with shell-command verification
#[derive(Debug, Parser)]
#[command(
    name = "prompter",
    about = "Run prompt-driven tasks against an AI coding assistant, verifying each with a shell command",
    version
)]
pub struct Cli {
    /// Path to the workflow TOML file
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Show what would run without spawning any subprocess
    #[arg(long)]
    pub dry_run: bool,

    /// Path of the persistent state file
    #[arg(long, value_name = "PATH", default_value = ".prompter_state.json")]
    pub state_file: PathBuf,

    /// Show the recorded task states and exit
    #[arg(long)]
    pub status: bool,

    /// Delete the recorded state and exit
    #[arg(long)]
    pub clear_state: bool,

    /// Generate a starter configuration file and exit
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = "prompter.toml"
    )]
    pub init: Option<PathBuf>,

    /// Run a single named task instead of the whole workflow
    #[arg(short, long, value_name = "NAME")]
    pub task: Option<String>,

    /// Disable progress output
    #[arg(long, conflicts_with = "simple_progress")]
    pub no_progress: bool,

    /// One line per task transition instead of the live display
    #[arg(long)]
    pub simple_progress: bool,
}

impl Cli {
    /// Progress mode requested by the flags (before env/terminal resolution)
    pub fn progress_mode(&self) -> ProgressMode {
        if self.no_progress {
            ProgressMode::None
        } else if self.simple_progress {
            ProgressMode::Simple
        } else {
            ProgressMode::Rich
        }
    }
}
