//! Drover Daemon
//!
//! The core of the Drover job submission system: discovers newly submitted
//! runs, renders each into an executable script, dispatches it to an
//! execution backend, and converges every run to a terminal state.
//!
//! Architecture:
//! - Configuration: settings from environment variables with defaults
//! - Persistence: SQLite pool, migrations, and repositories for runs/statuses
//! - Services: submission/query boundary and guarded status transitions
//! - Store: object store client that holds script templates
//! - Backend: execution backends (local process, cluster gateway)
//! - Scheduler: the process-wide handle to the chosen backend
//! - Executor: per-run pipeline (fetch, render, execute, report)
//! - Supervisor: background poll loop that dispatches new runs exactly once

pub mod backend;
pub mod config;
pub mod db;
pub mod executor;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod shutdown;
pub mod store;
pub mod supervisor;
pub mod template;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::executor::Executor;
use crate::scheduler::Scheduler;
use crate::supervisor::Supervisor;

/// Wire the daemon together and run it until the token is cancelled.
///
/// Construction order is explicit: database, scheduler handle, object
/// store, executor, supervisor. Everything is built once here and shared
/// for the process lifetime.
pub async fn start(config: Config, shutdown: CancellationToken) -> Result<()> {
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let scheduler = Arc::new(Scheduler::connect(&config).context("Failed to connect backend")?);

    let object_store = store::from_config(&config).context("Failed to build object store")?;

    let executor = Executor::new(pool.clone(), scheduler, object_store, &config);
    let supervisor = Supervisor::new(pool, executor, config.poll_interval);

    info!("Daemon initialized, entering supervision loop");
    supervisor.run(shutdown).await;

    Ok(())
}
