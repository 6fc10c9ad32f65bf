//! Daemon configuration
//!
//! Defines all configurable parameters for the daemon including polling
//! intervals, execution mode, object store location, and database settings.

use std::path::PathBuf;
use std::time::Duration;

/// Where rendered scripts are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run scripts as local subprocesses
    Local,
    /// Submit scripts to a cluster gateway
    Cluster,
}

/// Daemon configuration
///
/// All timeouts and intervals are configurable to allow tuning for
/// different deployment scenarios (dev vs prod, fast vs slow clusters).
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection string shared by daemon and CLI
    pub database_url: String,

    /// Execution mode chosen at startup, never per-run
    pub mode: ExecutionMode,

    /// Object store bucket holding script templates
    pub bucket: String,

    /// S3-style object store endpoint (cluster mode)
    pub store_endpoint: Option<String>,

    /// Root directory of the filesystem object store (local mode)
    pub store_root: PathBuf,

    /// Cluster gateway URL scripts are submitted to (cluster mode)
    pub gateway_url: String,

    /// How often the supervisor polls for newly created runs
    pub poll_interval: Duration,

    /// How often a pipeline polls its backend handle for completion
    pub handle_poll_interval: Duration,

    /// Maximum time a run may execute before it is failed with a timeout
    pub run_timeout: Duration,

    /// Max run pipelines executing concurrently
    pub max_parallel_runs: usize,

    /// Interpreter used to execute rendered scripts in local mode
    pub interpreter: String,

    /// Directory rendered scripts are materialized into
    pub work_dir: PathBuf,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables:
    /// - DATABASE_URL (default: sqlite://drover.db)
    /// - DROVER_MODE ("local" or "cluster", default: local)
    /// - STORE_BUCKET (default: drover)
    /// - STORE_ENDPOINT (required in cluster mode)
    /// - STORE_ROOT (default: ./store)
    /// - GATEWAY_URL (default: http://localhost:8787)
    /// - POLL_INTERVAL (seconds, default: 5)
    /// - HANDLE_POLL_INTERVAL_MS (milliseconds, default: 250)
    /// - RUN_TIMEOUT (seconds, default: 3600)
    /// - MAX_PARALLEL_RUNS (default: 4)
    /// - INTERPRETER (default: sh)
    /// - WORK_DIR (default: system temp dir)
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://drover.db".to_string());

        let mode = match std::env::var("DROVER_MODE").as_deref() {
            Ok("cluster") => ExecutionMode::Cluster,
            Ok("local") | Err(_) => ExecutionMode::Local,
            Ok(other) => anyhow::bail!("unknown DROVER_MODE '{}', expected local or cluster", other),
        };

        let bucket = std::env::var("STORE_BUCKET").unwrap_or_else(|_| "drover".to_string());

        let store_endpoint = std::env::var("STORE_ENDPOINT").ok();

        let store_root = std::env::var("STORE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./store"));

        let gateway_url =
            std::env::var("GATEWAY_URL").unwrap_or_else(|_| "http://localhost:8787".to_string());

        let poll_interval = std::env::var("POLL_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(5));

        let handle_poll_interval = std::env::var("HANDLE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(250));

        let run_timeout = std::env::var("RUN_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));

        let max_parallel_runs = std::env::var("MAX_PARALLEL_RUNS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(4);

        let interpreter = std::env::var("INTERPRETER").unwrap_or_else(|_| "sh".to_string());

        let work_dir = std::env::var("WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        Ok(Self {
            database_url,
            mode,
            bucket,
            store_endpoint,
            store_root,
            gateway_url,
            poll_interval,
            handle_poll_interval,
            run_timeout,
            max_parallel_runs,
            interpreter,
            work_dir,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("database_url cannot be empty");
        }

        if self.bucket.is_empty() {
            anyhow::bail!("bucket cannot be empty");
        }

        if self.poll_interval.as_secs() == 0 {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.handle_poll_interval.is_zero() {
            anyhow::bail!("handle_poll_interval must be greater than 0");
        }

        if self.max_parallel_runs == 0 {
            anyhow::bail!("max_parallel_runs must be greater than 0");
        }

        if self.mode == ExecutionMode::Cluster {
            let endpoint = self
                .store_endpoint
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("STORE_ENDPOINT is required in cluster mode"))?;

            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                anyhow::bail!("store endpoint must start with http:// or https://");
            }

            if !self.gateway_url.starts_with("http://") && !self.gateway_url.starts_with("https://")
            {
                anyhow::bail!("gateway_url must start with http:// or https://");
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://drover.db".to_string(),
            mode: ExecutionMode::Local,
            bucket: "drover".to_string(),
            store_endpoint: None,
            store_root: PathBuf::from("./store"),
            gateway_url: "http://localhost:8787".to_string(),
            poll_interval: Duration::from_secs(5),
            handle_poll_interval: Duration::from_millis(250),
            run_timeout: Duration::from_secs(3600),
            max_parallel_runs: 4,
            interpreter: "sh".to_string(),
            work_dir: std::env::temp_dir(),
        }
    }
}
