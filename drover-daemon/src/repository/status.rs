//! Status Repository
//!
//! Handles database operations for status rows. Statuses are deduplicated
//! by name; callers always go through `get_or_create`.

use drover_core::domain::status::Status;
use sqlx::SqlitePool;

/// Fetch the status with the given name, creating it if absent.
///
/// The insert-or-ignore followed by a select makes concurrent callers
/// converge on one row per name instead of racing to create duplicates.
pub async fn get_or_create(pool: &SqlitePool, name: &str) -> Result<Status, sqlx::Error> {
    sqlx::query("INSERT INTO statuses (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(pool)
        .await?;

    let row = sqlx::query_as::<_, StatusRow>("SELECT id, name FROM statuses WHERE name = ?1")
        .bind(name)
        .fetch_one(pool)
        .await?;

    Ok(row.into())
}

/// Find a status by name without creating it
pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Status>, sqlx::Error> {
    let row = sqlx::query_as::<_, StatusRow>("SELECT id, name FROM statuses WHERE name = ?1")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.into()))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct StatusRow {
    id: i64,
    name: String,
}

impl From<StatusRow> for Status {
    fn from(row: StatusRow) -> Self {
        Status {
            id: row.id,
            name: row.name,
        }
    }
}
