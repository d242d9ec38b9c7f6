//! Database operations for the `raw.pipeline_runs` ledger.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `raw.pipeline_runs`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PipelineRunRow {
    pub run_id: Uuid,
    pub trigger_source: String,
    pub state: String,
    pub failed_stage: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Stage results as a JSON array.
    pub stages: Value,
    pub created_at: DateTime<Utc>,
}

/// Values written by [`record_pipeline_run`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRunRecord {
    pub run_id: Uuid,
    pub trigger_source: String,
    pub state: String,
    pub failed_stage: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stages: Value,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Inserts a run, or updates it while it is still unfinished.
///
/// A run that already has `completed_at` set is never overwritten.
///
/// # Errors
///
/// Returns [`DbError::RunAlreadyFinished`] if the stored run is finished, or
/// [`DbError::Sqlx`] if the statement fails.
pub async fn record_pipeline_run(pool: &PgPool, run: &PipelineRunRecord) -> Result<(), DbError> {
    let result = sqlx::query(
        "INSERT INTO raw.pipeline_runs \
             (run_id, trigger_source, state, failed_stage, error_message, \
              started_at, completed_at, stages) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (run_id) DO UPDATE SET \
             state         = EXCLUDED.state, \
             failed_stage  = EXCLUDED.failed_stage, \
             error_message = EXCLUDED.error_message, \
             started_at    = EXCLUDED.started_at, \
             completed_at  = EXCLUDED.completed_at, \
             stages        = EXCLUDED.stages \
         WHERE raw.pipeline_runs.completed_at IS NULL",
    )
    .bind(run.run_id)
    .bind(&run.trigger_source)
    .bind(&run.state)
    .bind(&run.failed_stage)
    .bind(&run.error_message)
    .bind(run.started_at)
    .bind(run.completed_at)
    .bind(&run.stages)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::RunAlreadyFinished(run.run_id));
    }

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has the given id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_pipeline_run(pool: &PgPool, run_id: Uuid) -> Result<PipelineRunRow, DbError> {
    sqlx::query_as::<_, PipelineRunRow>(
        "SELECT run_id, trigger_source, state, failed_stage, error_message, \
                started_at, completed_at, stages, created_at \
         FROM raw.pipeline_runs \
         WHERE run_id = $1",
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pipeline_runs(pool: &PgPool, limit: i64) -> Result<Vec<PipelineRunRow>, DbError> {
    let rows = sqlx::query_as::<_, PipelineRunRow>(
        "SELECT run_id, trigger_source, state, failed_stage, error_message, \
                started_at, completed_at, stages, created_at \
         FROM raw.pipeline_runs \
         ORDER BY created_at DESC, started_at DESC NULLS LAST \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
