//! Run Service
//!
//! Business logic for run submission, lookup, and lifecycle transitions.
//! This is the submission/query boundary consumed by the CLI, and the
//! transition surface used by the executor.

use drover_core::domain::run::{Run, RunFailure, RunState};
use drover_core::dto::run::SubmitRun;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::repository::run_repository;

/// Service error type
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run not found: {0}")]
    NotFound(Uuid),

    #[error("invalid transition for run {run_id}: {from} -> {to}")]
    InvalidTransition {
        run_id: Uuid,
        from: RunState,
        to: RunState,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Validate and persist a new run in the `created` state.
///
/// Returns immediately after the record is written; execution happens later
/// when the supervisor discovers the run. Precondition failures (malformed
/// configs) surface here and create nothing.
pub async fn submit_run(pool: &SqlitePool, req: SubmitRun) -> Result<Run, RunError> {
    if req.script_path.trim().is_empty() {
        return Err(RunError::ValidationError(
            "script path cannot be empty".to_string(),
        ));
    }

    validate_json_object("model config", &req.model_config)?;
    validate_json_object("parameters", &req.parameters)?;

    let run = run_repository::create(pool, &req).await?;

    tracing::info!("Run submitted: {} (script: {})", run.id, run.script_path);

    Ok(run)
}

/// Get a run by ID
pub async fn get_run(pool: &SqlitePool, id: Uuid) -> Result<Run, RunError> {
    let run = run_repository::find_by_id(pool, id)
        .await?
        .ok_or(RunError::NotFound(id))?;

    Ok(run)
}

/// List all runs
pub async fn list_runs(pool: &SqlitePool) -> Result<Vec<Run>, RunError> {
    let runs = run_repository::list_all(pool).await?;
    Ok(runs)
}

/// List runs in a given state
pub async fn list_runs_by_state(
    pool: &SqlitePool,
    state: RunState,
) -> Result<Vec<Run>, RunError> {
    let runs = run_repository::find_by_state(pool, state).await?;
    Ok(runs)
}

/// Claim a run for dispatch (`created` -> `queued`).
///
/// Returns false when another dispatcher already claimed it; losing the
/// claim race is normal operation, not an error.
pub async fn claim_created(pool: &SqlitePool, run_id: Uuid) -> Result<bool, RunError> {
    let claimed = run_repository::claim_for_dispatch(pool, run_id).await?;
    Ok(claimed)
}

/// Mark a claimed run as running
pub async fn mark_running(pool: &SqlitePool, run_id: Uuid) -> Result<(), RunError> {
    if run_repository::update_to_running(pool, run_id).await? {
        return Ok(());
    }
    Err(rejected_transition(pool, run_id, RunState::Running).await)
}

/// Mark a running run as completed
pub async fn mark_completed(pool: &SqlitePool, run_id: Uuid) -> Result<(), RunError> {
    if run_repository::update_to_completed(pool, run_id).await? {
        tracing::info!("Run {} completed", run_id);
        return Ok(());
    }
    Err(rejected_transition(pool, run_id, RunState::Completed).await)
}

/// Mark a run as failed with a classified cause
pub async fn mark_failed(
    pool: &SqlitePool,
    run_id: Uuid,
    failure: &RunFailure,
) -> Result<(), RunError> {
    if run_repository::update_to_failed(pool, run_id, failure).await? {
        tracing::warn!("Run {} failed ({}): {}", run_id, failure.kind, failure.message);
        return Ok(());
    }
    Err(rejected_transition(pool, run_id, RunState::Failed).await)
}

// =============================================================================
// Helper Functions
// =============================================================================

fn validate_json_object(label: &str, text: &str) -> Result<(), RunError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| RunError::ValidationError(format!("{} is not valid JSON: {}", label, e)))?;

    if !value.is_object() {
        return Err(RunError::ValidationError(format!(
            "{} must be a JSON object",
            label
        )));
    }

    Ok(())
}

/// Build the error for a conditional update that affected no rows
async fn rejected_transition(pool: &SqlitePool, run_id: Uuid, to: RunState) -> RunError {
    match run_repository::find_by_id(pool, run_id).await {
        Ok(Some(run)) => {
            debug_assert!(!run.state.can_transition_to(to) || run.state.is_terminal());
            RunError::InvalidTransition {
                run_id,
                from: run.state,
                to,
            }
        }
        Ok(None) => RunError::NotFound(run_id),
        Err(e) => RunError::DatabaseError(e),
    }
}
