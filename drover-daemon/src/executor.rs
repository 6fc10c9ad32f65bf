//! Run executor
//!
//! Turns a discovered run into a monitored execution pipeline: claim,
//! fetch the script template, render it, hand it to the execution backend,
//! poll until terminal, and record the outcome. Each pipeline runs in its
//! own task so `execute` returns to the supervisor immediately.

use drover_core::domain::run::{FailureKind, RunFailure};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::backend::LaunchSpec;
use crate::config::Config;
use crate::scheduler::Scheduler;
use crate::service::run_service;
use crate::store::ObjectStore;
use crate::template;

/// Executes run pipelines against the configured backend
#[derive(Clone)]
pub struct Executor {
    pool: SqlitePool,
    scheduler: Arc<Scheduler>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    handle_poll_interval: Duration,
    run_timeout: Duration,
    semaphore: Arc<Semaphore>,
}

impl Executor {
    /// Creates a new executor with its concurrency limit
    pub fn new(
        pool: SqlitePool,
        scheduler: Arc<Scheduler>,
        store: Arc<dyn ObjectStore>,
        config: &Config,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_runs));
        Self {
            pool,
            scheduler,
            store,
            bucket: config.bucket.clone(),
            handle_poll_interval: config.handle_poll_interval,
            run_timeout: config.run_timeout,
            semaphore,
        }
    }

    /// Claim a run and launch its pipeline.
    ///
    /// Returns true if a pipeline was launched; false if the run stayed
    /// where it was (no free permit, or another dispatcher claimed it).
    /// Either way the caller does not wait for execution.
    pub async fn execute(&self, run_id: Uuid) -> anyhow::Result<bool> {
        // Try to acquire a permit first so a claimed run is never left
        // waiting for a worker slot
        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                debug!("Max parallel runs reached, leaving run {} for the next cycle", run_id);
                return Ok(false);
            }
        };

        if !run_service::claim_created(&self.pool, run_id).await? {
            debug!("Run {} already claimed, skipping", run_id);
            return Ok(false);
        }

        info!("Run {} claimed and queued for execution", run_id);

        let executor = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            executor.run_pipeline(run_id).await;
        });

        Ok(true)
    }

    /// Drives one claimed run to a terminal state
    async fn run_pipeline(&self, run_id: Uuid) {
        let result = tokio::time::timeout(self.run_timeout, self.drive(run_id)).await;

        let failure = match result {
            Ok(Ok(())) => return,
            Ok(Err(failure)) => failure,
            Err(_) => RunFailure {
                kind: FailureKind::Timeout,
                message: format!(
                    "run exceeded the maximum duration of {}s",
                    self.run_timeout.as_secs()
                ),
            },
        };

        error!("Run {} failed ({}): {}", run_id, failure.kind, failure.message);

        if let Err(e) = run_service::mark_failed(&self.pool, run_id, &failure).await {
            error!("Failed to record failure for run {}: {}", run_id, e);
        }
    }

    /// The pipeline proper: running marker, fetch, render, execute, report
    async fn drive(&self, run_id: Uuid) -> Result<(), RunFailure> {
        run_service::mark_running(&self.pool, run_id)
            .await
            .map_err(|e| infra_failure(&e))?;

        let run = run_service::get_run(&self.pool, run_id)
            .await
            .map_err(|e| infra_failure(&e))?;

        let template_bytes = self
            .store
            .fetch(&self.bucket, &run.script_path)
            .await
            .map_err(|e| RunFailure {
                kind: FailureKind::Fetch,
                message: e.to_string(),
            })?;

        let template_text = String::from_utf8(template_bytes).map_err(|_| RunFailure {
            kind: FailureKind::Fetch,
            message: format!("script template at {} is not valid UTF-8", run.script_path),
        })?;

        let parameters = template::parse_parameters(&run.parameters).map_err(|e| RunFailure {
            kind: FailureKind::Render,
            message: e.to_string(),
        })?;

        let script = template::render_script(&template_text, run_id, &run.model_config, &parameters)
            .map_err(|e| RunFailure {
                kind: FailureKind::Render,
                message: e.to_string(),
            })?;

        info!(
            "Submitting run {} to backend at {}",
            run_id,
            self.scheduler.address()
        );

        let handle = self
            .scheduler
            .backend()
            .submit(LaunchSpec {
                run_id,
                script,
            })
            .await
            .map_err(|e| RunFailure {
                kind: FailureKind::Backend,
                message: e.to_string(),
            })?;

        loop {
            let finished = handle.is_finished().await.map_err(|e| RunFailure {
                kind: FailureKind::Backend,
                message: e.to_string(),
            })?;
            if finished {
                break;
            }
            debug!("Run {} still executing", run_id);
            tokio::time::sleep(self.handle_poll_interval).await;
        }

        let outcome = handle.outcome().await.map_err(|e| RunFailure {
            kind: FailureKind::Backend,
            message: e.to_string(),
        })?;

        if !outcome.stdout.is_empty() {
            info!("Run {} stdout:\n{}", run_id, outcome.stdout);
        }
        if !outcome.stderr.is_empty() {
            info!("Run {} stderr:\n{}", run_id, outcome.stderr);
        }

        if outcome.success {
            run_service::mark_completed(&self.pool, run_id)
                .await
                .map_err(|e| infra_failure(&e))?;
            info!("Run {} completed successfully", run_id);
            return Ok(());
        }

        let kind = if outcome.exit_code.is_some() {
            FailureKind::NonZeroExit
        } else {
            FailureKind::Backend
        };

        Err(RunFailure {
            kind,
            message: outcome
                .message
                .unwrap_or_else(|| "backend reported failure".to_string()),
        })
    }
}

/// Failures outside the classified pipeline steps (persistence, lookups)
fn infra_failure(error: &dyn std::fmt::Display) -> RunFailure {
    RunFailure {
        kind: FailureKind::Backend,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionMode;
    use crate::db;
    use crate::store::FsStore;
    use drover_core::domain::run::{Run, RunState};
    use drover_core::dto::run::SubmitRun;

    struct Harness {
        pool: SqlitePool,
        executor: Executor,
        store: Arc<dyn ObjectStore>,
        _store_dir: tempfile::TempDir,
        _work_dir: tempfile::TempDir,
    }

    async fn harness(run_timeout: Duration, max_parallel_runs: usize) -> Harness {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let store_dir = tempfile::tempdir().unwrap();
        let work_dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.mode = ExecutionMode::Local;
        config.bucket = "drover".to_string();
        config.handle_poll_interval = Duration::from_millis(25);
        config.run_timeout = run_timeout;
        config.max_parallel_runs = max_parallel_runs;
        config.interpreter = "sh".to_string();
        config.work_dir = work_dir.path().to_path_buf();

        let scheduler = Arc::new(Scheduler::connect(&config).unwrap());
        let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(store_dir.path()));
        let executor = Executor::new(pool.clone(), scheduler, Arc::clone(&store), &config);

        Harness {
            pool,
            executor,
            store,
            _store_dir: store_dir,
            _work_dir: work_dir,
        }
    }

    async fn submit(h: &Harness, script_path: &str, parameters: &str) -> Run {
        run_service::submit_run(
            &h.pool,
            SubmitRun {
                script_path: script_path.to_string(),
                model_config: r#"{"layers": 3}"#.to_string(),
                parameters: parameters.to_string(),
            },
        )
        .await
        .unwrap()
    }

    async fn wait_terminal(pool: &SqlitePool, run_id: Uuid) -> Run {
        for _ in 0..400 {
            let run = run_service::get_run(pool, run_id).await.unwrap();
            if run.state.is_terminal() {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("run {} never reached a terminal state", run_id);
    }

    #[tokio::test]
    async fn test_valid_run_completes() {
        let h = harness(Duration::from_secs(30), 4).await;
        h.store
            .put("drover", "scripts/train.sh", b"echo run={{ run_id }} epochs={{ epochs }}")
            .await
            .unwrap();

        let run = submit(&h, "scripts/train.sh", r#"{"epochs": 3}"#).await;
        assert!(h.executor.execute(run.id).await.unwrap());

        let finished = wait_terminal(&h.pool, run.id).await;
        assert_eq!(finished.state, RunState::Completed);
        assert!(finished.started_at.is_some());
        assert!(finished.completed_at.is_some());
        assert!(finished.failure.is_none());
    }

    #[tokio::test]
    async fn test_missing_script_fails_at_fetch() {
        let h = harness(Duration::from_secs(30), 4).await;

        let run = submit(&h, "scripts/missing.sh", r#"{"epochs": 3}"#).await;
        assert!(h.executor.execute(run.id).await.unwrap());

        let finished = wait_terminal(&h.pool, run.id).await;
        assert_eq!(finished.state, RunState::Failed);
        let failure = finished.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Fetch);
        assert!(failure.message.contains("missing.sh"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_classified() {
        let h = harness(Duration::from_secs(30), 4).await;
        h.store
            .put("drover", "scripts/bad.sh", b"echo diverged >&2\nexit 1")
            .await
            .unwrap();

        let run = submit(&h, "scripts/bad.sh", "{}").await;
        assert!(h.executor.execute(run.id).await.unwrap());

        let finished = wait_terminal(&h.pool, run.id).await;
        assert_eq!(finished.state, RunState::Failed);
        assert_eq!(finished.failure.unwrap().kind, FailureKind::NonZeroExit);
    }

    #[tokio::test]
    async fn test_bad_template_fails_at_render() {
        let h = harness(Duration::from_secs(30), 4).await;
        h.store
            .put("drover", "scripts/broken.sh", b"echo {{ unclosed")
            .await
            .unwrap();

        let run = submit(&h, "scripts/broken.sh", "{}").await;
        assert!(h.executor.execute(run.id).await.unwrap());

        let finished = wait_terminal(&h.pool, run.id).await;
        assert_eq!(finished.state, RunState::Failed);
        assert_eq!(finished.failure.unwrap().kind, FailureKind::Render);
    }

    #[tokio::test]
    async fn test_timeout_converges_to_failed() {
        let h = harness(Duration::from_millis(300), 4).await;
        h.store
            .put("drover", "scripts/slow.sh", b"sleep 30")
            .await
            .unwrap();

        let run = submit(&h, "scripts/slow.sh", "{}").await;
        assert!(h.executor.execute(run.id).await.unwrap());

        let finished = wait_terminal(&h.pool, run.id).await;
        assert_eq!(finished.state, RunState::Failed);
        assert_eq!(finished.failure.unwrap().kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_concurrent_runs_do_not_interfere() {
        let h = harness(Duration::from_secs(30), 4).await;
        h.store
            .put("drover", "scripts/ok.sh", b"echo fine")
            .await
            .unwrap();

        let good = submit(&h, "scripts/ok.sh", "{}").await;
        let bad = submit(&h, "scripts/absent.sh", "{}").await;

        assert!(h.executor.execute(good.id).await.unwrap());
        assert!(h.executor.execute(bad.id).await.unwrap());

        let good_finished = wait_terminal(&h.pool, good.id).await;
        let bad_finished = wait_terminal(&h.pool, bad.id).await;

        assert_eq!(good_finished.state, RunState::Completed);
        assert_eq!(bad_finished.state, RunState::Failed);
    }

    #[tokio::test]
    async fn test_double_dispatch_claims_once() {
        let h = harness(Duration::from_secs(30), 4).await;
        h.store
            .put("drover", "scripts/ok.sh", b"echo fine")
            .await
            .unwrap();

        let run = submit(&h, "scripts/ok.sh", "{}").await;

        let launched_first = h.executor.execute(run.id).await.unwrap();
        let launched_second = h.executor.execute(run.id).await.unwrap();
        assert!(launched_first);
        assert!(!launched_second, "second dispatch must lose the claim");

        let finished = wait_terminal(&h.pool, run.id).await;
        assert_eq!(finished.state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_concurrency_limit_defers_excess_runs() {
        let h = harness(Duration::from_secs(30), 1).await;
        h.store
            .put("drover", "scripts/slowish.sh", b"sleep 2")
            .await
            .unwrap();

        let first = submit(&h, "scripts/slowish.sh", "{}").await;
        let second = submit(&h, "scripts/slowish.sh", "{}").await;

        assert!(h.executor.execute(first.id).await.unwrap());
        assert!(!h.executor.execute(second.id).await.unwrap());

        // The deferred run is untouched and still discoverable
        let deferred = run_service::get_run(&h.pool, second.id).await.unwrap();
        assert_eq!(deferred.state, RunState::Created);
    }
}
