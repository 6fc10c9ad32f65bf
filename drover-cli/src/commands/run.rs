//! Run command handlers
//!
//! Handles submission and inspection of runs. The CLI shares the daemon's
//! database and object store: submission uploads the script template and
//! creates the run record; the daemon picks it up from there.

use anyhow::{Context, Result};
use colored::*;
use std::path::PathBuf;
use uuid::Uuid;

use drover_core::domain::run::{Run, RunState};
use drover_core::dto::run::SubmitRun;
use drover_daemon::config::Config;
use drover_daemon::service::run_service;
use drover_daemon::{db, store};

/// Submit a new run
pub async fn handle_submit(
    config: &Config,
    script: PathBuf,
    job_config: PathBuf,
    model_config: PathBuf,
) -> Result<()> {
    // Check all inputs before touching the store or database
    if !script.exists() {
        println!("{}", "Script file does not exist.".red());
        return Ok(());
    }
    if !job_config.exists() {
        println!("{}", "Job config file does not exist.".red());
        return Ok(());
    }
    if !model_config.exists() {
        println!("{}", "Model config file does not exist.".red());
        return Ok(());
    }

    let script_text = tokio::fs::read_to_string(&script)
        .await
        .context("Failed to read script file")?;
    let parameters = tokio::fs::read_to_string(&job_config)
        .await
        .context("Failed to read job config file")?;
    let model = tokio::fs::read_to_string(&model_config)
        .await
        .context("Failed to read model config file")?;

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to open database")?;
    db::run_migrations(&pool).await?;

    let object_store = store::from_config(config)?;

    let script_path = format!("scripts/{}", Uuid::new_v4());
    object_store
        .put(&config.bucket, &script_path, script_text.as_bytes())
        .await
        .context("Failed to upload script to the object store")?;

    let run = run_service::submit_run(
        &pool,
        SubmitRun {
            script_path,
            model_config: model,
            parameters,
        },
    )
    .await?;

    println!("{}", format!("Submitted job with run id {}", run.id).green().bold());

    Ok(())
}

/// List all runs
pub async fn handle_list(config: &Config) -> Result<()> {
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to open database")?;
    db::run_migrations(&pool).await?;

    let runs = run_service::list_runs(&pool).await?;

    if runs.is_empty() {
        println!("{}", "No runs found.".yellow());
    } else {
        println!("{}", format!("Found {} run(s):", runs.len()).bold());
        println!();
        for run in runs {
            print_run_summary(&run);
        }
    }

    Ok(())
}

/// Show a single run
pub async fn handle_show(config: &Config, run_id: &str) -> Result<()> {
    let id = Uuid::parse_str(run_id).context("Invalid run id")?;

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to open database")?;
    db::run_migrations(&pool).await?;

    match run_service::get_run(&pool, id).await {
        Ok(run) => {
            print_run_details(&run);
            Ok(())
        }
        Err(run_service::RunError::NotFound(_)) => {
            println!("{}", format!("Run {} not found.", run_id).yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Print a run summary line
fn print_run_summary(run: &Run) {
    println!("  {} Run {}", "▸".cyan(), run.id.to_string().dimmed());
    println!("    Status:    {}", colorize_state(run.state));
    println!(
        "    Submitted: {}",
        run.submitted_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

/// Print detailed run information
fn print_run_details(run: &Run) {
    println!("{}", "Run Details:".bold());
    println!("  ID:        {}", run.id.to_string().cyan());
    println!("  Script:    {}", run.script_path.dimmed());
    println!("  Status:    {}", colorize_state(run.state));
    println!(
        "  Submitted: {}",
        run.submitted_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(started_at) = run.started_at {
        println!("  Started:   {}", started_at.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(completed_at) = run.completed_at {
        println!("  Finished:  {}", completed_at.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(failure) = &run.failure {
        println!("  Failure:   {} {}", failure.kind.to_string().red(), failure.message.dimmed());
    }

    if !run.state.is_terminal() {
        println!();
        println!(
            "{}",
            "The run has not reached a terminal state yet; check again shortly.".dimmed()
        );
    }
}

fn colorize_state(state: RunState) -> ColoredString {
    match state {
        RunState::Created => state.as_str().yellow(),
        RunState::Queued => state.as_str().cyan(),
        RunState::Running => state.as_str().blue(),
        RunState::Completed => state.as_str().green(),
        RunState::Failed => state.as_str().red(),
    }
}
