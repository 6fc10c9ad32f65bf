//! Execution backends
//!
//! A backend accepts a rendered script and runs it somewhere: as a local
//! subprocess or on a compute cluster behind a gateway. Submission returns
//! a handle the executor polls until the work reaches a terminal state.
//!
//! Trait-based to enable testing and dependency injection.

mod gateway;
mod process;

// Re-export implementations
pub use gateway::GatewayBackend;
pub use process::ProcessBackend;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors from backend submission and polling
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gateway request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("gateway returned status {status}: {message}")]
    BadStatus { status: u16, message: String },

    #[error("outcome requested before the work finished")]
    NotFinished,
}

/// A rendered script ready for execution
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub run_id: Uuid,
    pub script: String,
}

/// Terminal result of an executed script
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub message: Option<String>,
}

/// Handle to work submitted to a backend
///
/// The executor polls `is_finished` at a fixed short interval, then reads
/// the outcome once finished.
#[async_trait]
pub trait RunHandle: Send + Sync {
    async fn is_finished(&self) -> Result<bool, BackendError>;

    async fn is_failed(&self) -> Result<bool, BackendError>;

    async fn is_successful(&self) -> Result<bool, BackendError>;

    /// Terminal outcome; `NotFinished` if the work is still going
    async fn outcome(&self) -> Result<RunOutcome, BackendError>;
}

/// A compute backend capable of executing rendered scripts
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn submit(&self, spec: LaunchSpec) -> Result<Box<dyn RunHandle>, BackendError>;
}
