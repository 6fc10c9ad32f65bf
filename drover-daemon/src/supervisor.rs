//! Run supervisor
//!
//! Background loop that discovers newly submitted runs and hands each to
//! the executor exactly once. Dispatch is fire-and-forget; the loop never
//! waits for a pipeline and never dies because one cycle failed.

use anyhow::{Context, Result};
use drover_core::domain::run::RunState;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::executor::Executor;
use crate::repository::run_repository;

/// Polling loop that dispatches new runs
pub struct Supervisor {
    pool: SqlitePool,
    executor: Executor,
    poll_interval: Duration,
}

impl Supervisor {
    /// Creates a new supervisor with its dependencies injected up front
    pub fn new(pool: SqlitePool, executor: Executor, poll_interval: Duration) -> Self {
        Self {
            pool,
            executor,
            poll_interval,
        }
    }

    /// Runs the polling loop until the token is cancelled.
    ///
    /// Every cycle ends with the configured sleep, whether the cycle
    /// succeeded or failed; errors are logged and never escape the loop.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Starting supervisor (poll interval: {:?})", self.poll_interval);

        loop {
            debug!("Polling for new runs");

            match self.poll_once().await {
                Ok(dispatched) => {
                    if dispatched > 0 {
                        info!("Dispatched {} run(s) this cycle", dispatched);
                    }
                }
                Err(e) => {
                    error!("Error during poll cycle: {:#}", e);
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Supervisor shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Performs a single poll cycle, returning how many pipelines launched
    async fn poll_once(&self) -> Result<usize> {
        let runs = run_repository::find_by_state(&self.pool, RunState::Created)
            .await
            .context("Failed to fetch newly created runs")?;

        if runs.is_empty() {
            debug!("No new runs");
            return Ok(0);
        }

        info!("Found {} new run(s)", runs.len());

        let mut dispatched = 0;

        for run in runs {
            match self.executor.execute(run.id).await {
                Ok(true) => dispatched += 1,
                Ok(false) => {}
                Err(e) => {
                    error!("Failed to dispatch run {}: {:#}", run.id, e);
                }
            }
        }

        Ok(dispatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ExecutionMode};
    use crate::db;
    use crate::scheduler::Scheduler;
    use crate::service::run_service;
    use crate::store::{FsStore, ObjectStore};
    use drover_core::dto::run::SubmitRun;
    use std::sync::Arc;

    async fn wait_state(pool: &SqlitePool, run_id: uuid::Uuid, state: RunState) {
        for _ in 0..400 {
            let run = run_service::get_run(pool, run_id).await.unwrap();
            if run.state == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("run {} never reached {}", run_id, state);
    }

    #[tokio::test]
    async fn test_submitted_run_is_discovered_and_finished() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let store_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.mode = ExecutionMode::Local;
        config.poll_interval = Duration::from_millis(50);
        config.handle_poll_interval = Duration::from_millis(25);
        config.work_dir = work_dir.path().to_path_buf();

        let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(store_dir.path()));
        store
            .put("drover", "scripts/train.sh", b"echo done")
            .await
            .unwrap();

        let scheduler = Arc::new(Scheduler::connect(&config).unwrap());
        let executor = Executor::new(pool.clone(), scheduler, store, &config);
        let supervisor = Supervisor::new(pool.clone(), executor, config.poll_interval);

        let shutdown = CancellationToken::new();
        let loop_token = shutdown.clone();
        let handle = tokio::spawn(async move { supervisor.run(loop_token).await });

        // Submit after the loop is already polling: liveness
        let run = run_service::submit_run(
            &pool,
            SubmitRun {
                script_path: "scripts/train.sh".to_string(),
                model_config: "{}".to_string(),
                parameters: "{}".to_string(),
            },
        )
        .await
        .unwrap();

        wait_state(&pool, run.id, RunState::Completed).await;

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let work_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.poll_interval = Duration::from_secs(60);
        config.work_dir = work_dir.path().to_path_buf();

        let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(store_dir.path()));
        let scheduler = Arc::new(Scheduler::connect(&config).unwrap());
        let executor = Executor::new(pool.clone(), scheduler, store, &config);
        let supervisor = Supervisor::new(pool, executor, config.poll_interval);

        let shutdown = CancellationToken::new();
        let loop_token = shutdown.clone();
        let handle = tokio::spawn(async move { supervisor.run(loop_token).await });

        // Even with a long poll interval the loop exits promptly
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("supervisor did not stop")
            .unwrap();
    }
}
