//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod daemon;
mod run;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use drover_daemon::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a job: uploads the script and creates a run
    Submit {
        /// Script template to execute
        script: PathBuf,

        /// JSON file with job parameters (template variables)
        job_config: PathBuf,

        /// JSON file with the model configuration
        model_config: PathBuf,
    },
    /// List all runs
    List,
    /// Show a single run
    Show {
        /// Run ID
        run_id: String,
    },
    /// Run the Drover daemon in the foreground
    Daemon,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Submit {
            script,
            job_config,
            model_config,
        } => run::handle_submit(config, script, job_config, model_config).await,
        Commands::List => run::handle_list(config).await,
        Commands::Show { run_id } => run::handle_show(config, &run_id).await,
        Commands::Daemon => daemon::handle_daemon(config).await,
    }
}
