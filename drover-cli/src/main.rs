//! Drover CLI
//!
//! Command-line interface for submitting and inspecting runs, and for
//! starting the Drover daemon.

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use drover_daemon::config::Config;

#[derive(Parser)]
#[command(name = "drover")]
#[command(about = "Drover training-job submission CLI", long_about = None)]
struct Cli {
    /// Database connection string shared with the daemon
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }
    config.validate()?;

    handle_command(cli.command, &config).await
}
