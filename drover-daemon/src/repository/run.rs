//! Run Repository
//!
//! Handles all database operations related to runs. Status transitions are
//! conditional updates keyed on the current status, so an illegal or stale
//! transition affects zero rows instead of silently overwriting state.

use drover_core::domain::run::{FailureKind, Run, RunFailure, RunState};
use drover_core::dto::run::SubmitRun;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::repository::status;

const RUN_COLUMNS: &str = r#"
    SELECT r.id, r.script_path, r.model_config, r.parameters,
           s.name AS status, r.submitted_at, r.started_at, r.completed_at,
           r.failure_kind, r.failure_message
    FROM runs r
    JOIN statuses s ON s.id = r.status_id
"#;

/// Create a new run in the `created` state
pub async fn create(pool: &SqlitePool, req: &SubmitRun) -> Result<Run, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    let created = status::get_or_create(pool, RunState::Created.as_str()).await?;

    sqlx::query(
        r#"
        INSERT INTO runs (id, script_path, model_config, parameters, status_id, submitted_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(id.to_string())
    .bind(&req.script_path)
    .bind(&req.model_config)
    .bind(&req.parameters)
    .bind(created.id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Run {
        id,
        script_path: req.script_path.clone(),
        model_config: req.model_config.clone(),
        parameters: req.parameters.clone(),
        state: RunState::Created,
        submitted_at: now,
        started_at: None,
        completed_at: None,
        failure: None,
    })
}

/// Find a run by ID
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Run>, sqlx::Error> {
    let sql = format!("{} WHERE r.id = ?1", RUN_COLUMNS);

    let row = sqlx::query_as::<_, RunRow>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.into()))
}

/// Find runs in a given state, oldest first
pub async fn find_by_state(pool: &SqlitePool, state: RunState) -> Result<Vec<Run>, sqlx::Error> {
    let sql = format!("{} WHERE s.name = ?1 ORDER BY r.submitted_at ASC", RUN_COLUMNS);

    let rows = sqlx::query_as::<_, RunRow>(&sql)
        .bind(state.as_str())
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// List all runs, newest first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Run>, sqlx::Error> {
    let sql = format!("{} ORDER BY r.submitted_at DESC", RUN_COLUMNS);

    let rows = sqlx::query_as::<_, RunRow>(&sql).fetch_all(pool).await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Atomically claim a run for dispatch (`created` -> `queued`).
///
/// Discovery and the queued transition are one conditional update, so a run
/// seen by two overlapping poll cycles is claimed by exactly one caller.
/// Returns false if the run was not in `created` (already claimed or gone).
pub async fn claim_for_dispatch(pool: &SqlitePool, run_id: Uuid) -> Result<bool, sqlx::Error> {
    let created = status::get_or_create(pool, RunState::Created.as_str()).await?;
    let queued = status::get_or_create(pool, RunState::Queued.as_str()).await?;

    let result = sqlx::query(
        r#"
        UPDATE runs
        SET status_id = ?1
        WHERE id = ?2 AND status_id = ?3
        "#,
    )
    .bind(queued.id)
    .bind(run_id.to_string())
    .bind(created.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Transition a run `queued` -> `running`, stamping its start time.
///
/// Returns false if the run was not in `queued`.
pub async fn update_to_running(pool: &SqlitePool, run_id: Uuid) -> Result<bool, sqlx::Error> {
    let queued = status::get_or_create(pool, RunState::Queued.as_str()).await?;
    let running = status::get_or_create(pool, RunState::Running.as_str()).await?;
    let now = chrono::Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE runs
        SET status_id = ?1, started_at = ?2
        WHERE id = ?3 AND status_id = ?4
        "#,
    )
    .bind(running.id)
    .bind(now)
    .bind(run_id.to_string())
    .bind(queued.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Transition a run `running` -> `completed`, stamping its completion time.
///
/// Returns false if the run was not in `running`.
pub async fn update_to_completed(pool: &SqlitePool, run_id: Uuid) -> Result<bool, sqlx::Error> {
    let running = status::get_or_create(pool, RunState::Running.as_str()).await?;
    let completed = status::get_or_create(pool, RunState::Completed.as_str()).await?;
    let now = chrono::Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE runs
        SET status_id = ?1, completed_at = ?2
        WHERE id = ?3 AND status_id = ?4
        "#,
    )
    .bind(completed.id)
    .bind(now)
    .bind(run_id.to_string())
    .bind(running.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Transition a run to `failed` with a classified cause.
///
/// Allowed from `queued` or `running`, so a pipeline that dies before its
/// start marker still converges. Returns false otherwise (already terminal).
pub async fn update_to_failed(
    pool: &SqlitePool,
    run_id: Uuid,
    failure: &RunFailure,
) -> Result<bool, sqlx::Error> {
    let queued = status::get_or_create(pool, RunState::Queued.as_str()).await?;
    let running = status::get_or_create(pool, RunState::Running.as_str()).await?;
    let failed = status::get_or_create(pool, RunState::Failed.as_str()).await?;
    let now = chrono::Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE runs
        SET status_id = ?1, completed_at = ?2, failure_kind = ?3, failure_message = ?4
        WHERE id = ?5 AND status_id IN (?6, ?7)
        "#,
    )
    .bind(failed.id)
    .bind(now)
    .bind(failure.kind.as_str())
    .bind(&failure.message)
    .bind(run_id.to_string())
    .bind(queued.id)
    .bind(running.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    script_path: String,
    model_config: String,
    parameters: String,
    status: String,
    submitted_at: chrono::DateTime<chrono::Utc>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    failure_kind: Option<String>,
    failure_message: Option<String>,
}

impl From<RunRow> for Run {
    fn from(row: RunRow) -> Self {
        let state = RunState::parse(&row.status).unwrap_or(RunState::Created);

        let failure = match (row.failure_kind, row.failure_message) {
            (Some(kind), Some(message)) => Some(RunFailure {
                kind: FailureKind::parse(&kind).unwrap_or(FailureKind::Backend),
                message,
            }),
            _ => None,
        };

        Run {
            id: Uuid::parse_str(&row.id).unwrap_or(Uuid::nil()),
            script_path: row.script_path,
            model_config: row.model_config,
            parameters: row.parameters,
            state,
            submitted_at: row.submitted_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_pool() -> SqlitePool {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    fn submit_req() -> SubmitRun {
        SubmitRun {
            script_path: "scripts/train.py".to_string(),
            model_config: r#"{"layers": 3}"#.to_string(),
            parameters: r#"{"epochs": 3}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_round_trip() {
        let pool = test_pool().await;

        let run = create(&pool, &submit_req()).await.unwrap();
        assert_eq!(run.state, RunState::Created);

        let found = find_by_id(&pool, run.id).await.unwrap().unwrap();
        assert_eq!(found.id, run.id);
        assert_eq!(found.script_path, "scripts/train.py");
        assert_eq!(found.state, RunState::Created);
        assert!(found.started_at.is_none());
        assert!(found.failure.is_none());
    }

    #[tokio::test]
    async fn test_find_by_id_missing() {
        let pool = test_pool().await;
        assert!(find_by_id(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_wins_exactly_once() {
        let pool = test_pool().await;
        let run = create(&pool, &submit_req()).await.unwrap();

        let (first, second) = tokio::join!(
            claim_for_dispatch(&pool, run.id),
            claim_for_dispatch(&pool, run.id),
        );

        let first = first.unwrap();
        let second = second.unwrap();
        assert!(first != second, "exactly one claim must win");

        let found = find_by_id(&pool, run.id).await.unwrap().unwrap();
        assert_eq!(found.state, RunState::Queued);
    }

    #[tokio::test]
    async fn test_full_lifecycle_to_completed() {
        let pool = test_pool().await;
        let run = create(&pool, &submit_req()).await.unwrap();

        assert!(claim_for_dispatch(&pool, run.id).await.unwrap());
        assert!(update_to_running(&pool, run.id).await.unwrap());
        assert!(update_to_completed(&pool, run.id).await.unwrap());

        let found = find_by_id(&pool, run.id).await.unwrap().unwrap();
        assert_eq!(found.state, RunState::Completed);
        assert!(found.started_at.is_some());
        assert!(found.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_from_queued_records_cause() {
        let pool = test_pool().await;
        let run = create(&pool, &submit_req()).await.unwrap();
        assert!(claim_for_dispatch(&pool, run.id).await.unwrap());

        let failure = RunFailure {
            kind: FailureKind::Fetch,
            message: "object not found: scripts/train.py".to_string(),
        };
        assert!(update_to_failed(&pool, run.id, &failure).await.unwrap());

        let found = find_by_id(&pool, run.id).await.unwrap().unwrap();
        assert_eq!(found.state, RunState::Failed);
        let recorded = found.failure.unwrap();
        assert_eq!(recorded.kind, FailureKind::Fetch);
        assert!(recorded.message.contains("train.py"));
    }

    #[tokio::test]
    async fn test_terminal_state_rejects_further_transitions() {
        let pool = test_pool().await;
        let run = create(&pool, &submit_req()).await.unwrap();

        assert!(claim_for_dispatch(&pool, run.id).await.unwrap());
        assert!(update_to_running(&pool, run.id).await.unwrap());
        assert!(update_to_completed(&pool, run.id).await.unwrap());

        // No transition moves a run backward or out of a terminal state
        assert!(!claim_for_dispatch(&pool, run.id).await.unwrap());
        assert!(!update_to_running(&pool, run.id).await.unwrap());
        let failure = RunFailure {
            kind: FailureKind::Backend,
            message: "late failure".to_string(),
        };
        assert!(!update_to_failed(&pool, run.id, &failure).await.unwrap());

        let found = find_by_id(&pool, run.id).await.unwrap().unwrap();
        assert_eq!(found.state, RunState::Completed);
        assert!(found.failure.is_none());
    }

    #[tokio::test]
    async fn test_running_requires_queued() {
        let pool = test_pool().await;
        let run = create(&pool, &submit_req()).await.unwrap();

        // Still in created: the start marker must not apply
        assert!(!update_to_running(&pool, run.id).await.unwrap());
        let found = find_by_id(&pool, run.id).await.unwrap().unwrap();
        assert_eq!(found.state, RunState::Created);
    }

    #[tokio::test]
    async fn test_find_by_state_filters() {
        let pool = test_pool().await;
        let first = create(&pool, &submit_req()).await.unwrap();
        let second = create(&pool, &submit_req()).await.unwrap();
        claim_for_dispatch(&pool, second.id).await.unwrap();

        let created = find_by_state(&pool, RunState::Created).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].id, first.id);

        let queued = find_by_state(&pool, RunState::Queued).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, second.id);
    }

    #[tokio::test]
    async fn test_list_all_returns_every_run() {
        let pool = test_pool().await;
        for _ in 0..3 {
            create(&pool, &submit_req()).await.unwrap();
        }

        let runs = list_all(&pool).await.unwrap();
        assert_eq!(runs.len(), 3);
    }
}
