//! Run domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One submitted training job, tracked through its lifecycle.
///
/// Structure shared between the daemon (persists and executes) and the CLI
/// (submits and inspects). The model and parameters configs are opaque JSON
/// text; the daemon only reads top-level key/value pairs out of the
/// parameters when rendering the script template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    /// Object store path of the script template this run executes
    pub script_path: String,
    pub model_config: String,
    pub parameters: String,
    pub state: RunState,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub failure: Option<RunFailure>,
}

/// Lifecycle state of a run
///
/// Legal transitions move strictly forward:
/// `Created -> Queued -> Running -> Completed | Failed`, with `Queued ->
/// Failed` allowed so a pipeline that dies before starting still converges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Created,
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunState {
    /// Canonical status name as stored in the statuses table
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Created => "created",
            RunState::Queued => "queued",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }

    /// Parses a stored status name back into a state
    pub fn parse(name: &str) -> Option<RunState> {
        match name {
            "created" => Some(RunState::Created),
            "queued" => Some(RunState::Queued),
            "running" => Some(RunState::Running),
            "completed" => Some(RunState::Completed),
            "failed" => Some(RunState::Failed),
            _ => None,
        }
    }

    /// Whether `next` is a legal transition from this state
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Created, RunState::Queued)
                | (RunState::Queued, RunState::Running)
                | (RunState::Queued, RunState::Failed)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::Failed)
        )
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run ended in `Failed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Classification of a terminal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Script template could not be fetched from the object store
    Fetch,
    /// Template rendering failed (bad template or parameters)
    Render,
    /// The execution backend reported an infrastructure failure
    Backend,
    /// The rendered script ran but exited non-zero
    NonZeroExit,
    /// The pipeline exceeded the configured maximum duration
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Fetch => "fetch",
            FailureKind::Render => "render",
            FailureKind::Backend => "backend",
            FailureKind::NonZeroExit => "nonzero-exit",
            FailureKind::Timeout => "timeout",
        }
    }

    pub fn parse(name: &str) -> Option<FailureKind> {
        match name {
            "fetch" => Some(FailureKind::Fetch),
            "render" => Some(FailureKind::Render),
            "backend" => Some(FailureKind::Backend),
            "nonzero-exit" => Some(FailureKind::NonZeroExit),
            "timeout" => Some(FailureKind::Timeout),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
