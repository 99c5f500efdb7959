//! prompter - CLI entry point

use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use eyre::{Context, Result};
use tracing_subscriber::EnvFilter;

use prompter::agent::{AgentClient, ClaudeCliClient};
use prompter::cli::Cli;
use prompter::config::{ConfigError, WorkflowConfig};
use prompter::orchestrator::{self, RuntimeOptions};
use prompter::state::StateStore;
use prompter::{init, run_workflow};

fn setup_logging(cli: &Cli) -> Result<()> {
    let level = if cli.debug || cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(&cli).context("Failed to set up logging")?;

    let state = Arc::new(StateStore::load(&cli.state_file).await);

    // Commands that do not need a configuration file.
    if cli.status {
        orchestrator::print_status(&state, cli.verbose).await;
        return Ok(ExitCode::SUCCESS);
    }
    if cli.clear_state {
        state.clear().await;
        println!("State cleared.");
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(path) = &cli.init {
        return Ok(match init::generate_starter_config(path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        });
    }

    let Some(config_path) = &cli.config else {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "configuration file is required unless using --status, --clear-state, or --init",
            )
            .exit();
    };

    let config = match WorkflowConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    match config.validate() {
        Ok(()) => {}
        Err(ConfigError::Invalid(errors)) => {
            eprintln!("Configuration errors:");
            for error in &errors {
                eprintln!("  - {error}");
            }
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(ExitCode::FAILURE);
        }
    }

    let agent: Arc<dyn AgentClient> = Arc::new(ClaudeCliClient::new(
        config.settings.claude_command.clone(),
        config.working_directory(),
    ));

    let options = RuntimeOptions {
        dry_run: cli.dry_run,
        verbose: cli.verbose,
        task: cli.task.clone(),
        progress_mode: cli.progress_mode(),
    };

    let code = run_workflow(config, state, agent, options).await?;
    Ok(if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
