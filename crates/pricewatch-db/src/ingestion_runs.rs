//! Database operations for `ingestion_runs` and `ingestion_batches`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `ingestion_runs` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IngestionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    /// `cli` or `scheduler`.
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `ingestion_batches` table: one store x query unit of work.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IngestionBatchRow {
    pub id: i64,
    pub run_id: i64,
    pub store_name: String,
    pub query: String,
    pub status: String,
    pub fetched: i64,
    pub dropped: i64,
    pub inserted: i64,
    pub updated: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Succeeded,
    /// Some records were persisted but the fetch did not complete.
    Partial,
    /// Nothing to do: store not configured or unsupported.
    Skipped,
    Failed,
}

impl BatchStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Succeeded => "succeeded",
            BatchStatus::Partial => "partial",
            BatchStatus::Skipped => "skipped",
            BatchStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values recorded for one finished batch.
#[derive(Debug, Clone)]
pub struct NewIngestionBatch<'a> {
    pub store_name: &'a str,
    pub query: &'a str,
    pub status: BatchStatus,
    pub fetched: usize,
    pub dropped: usize,
    pub inserted: usize,
    pub updated: usize,
    pub error_message: Option<&'a str>,
}

fn count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// ---------------------------------------------------------------------------
// ingestion_runs operations
// ---------------------------------------------------------------------------

const RUN_COLUMNS: &str = "id, public_id, trigger_source, status, started_at, completed_at, \
     records_processed, error_message, created_at";

/// Creates a new ingestion run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_ingestion_run(
    pool: &SqlitePool,
    trigger_source: &str,
) -> Result<IngestionRunRow, DbError> {
    let sql = format!(
        "INSERT INTO ingestion_runs (public_id, trigger_source, status) \
         VALUES (?1, ?2, 'queued') \
         RETURNING {RUN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, IngestionRunRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(trigger_source)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `queued`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_ingestion_run(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'running', started_at = ?1 \
         WHERE id = ?2 AND status = 'queued'",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded`, setting `completed_at` and `records_processed`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_ingestion_run(
    pool: &SqlitePool,
    id: i64,
    records_processed: usize,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'succeeded', completed_at = ?1, records_processed = ?2 \
         WHERE id = ?3 AND status = 'running'",
    )
    .bind(Utc::now())
    .bind(count(records_processed))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, setting `completed_at` and `error_message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_ingestion_run(
    pool: &SqlitePool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE ingestion_runs \
         SET status = 'failed', completed_at = ?1, error_message = ?2 \
         WHERE id = ?3 AND status = 'running'",
    )
    .bind(Utc::now())
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_ingestion_run(pool: &SqlitePool, id: i64) -> Result<IngestionRunRow, DbError> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM ingestion_runs WHERE id = ?1");
    sqlx::query_as::<_, IngestionRunRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// ingestion_batches operations
// ---------------------------------------------------------------------------

/// Records the outcome of one batch within a run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_ingestion_batch(
    pool: &SqlitePool,
    run_id: i64,
    batch: &NewIngestionBatch<'_>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO ingestion_batches \
             (run_id, store_name, query, status, fetched, dropped, inserted, updated, error_message) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(run_id)
    .bind(batch.store_name)
    .bind(batch.query)
    .bind(batch.status.as_str())
    .bind(count(batch.fetched))
    .bind(count(batch.dropped))
    .bind(count(batch.inserted))
    .bind(count(batch.updated))
    .bind(batch.error_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns all batches of a run, in the order they were recorded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingestion_batches(
    pool: &SqlitePool,
    run_id: i64,
) -> Result<Vec<IngestionBatchRow>, DbError> {
    let rows = sqlx::query_as::<_, IngestionBatchRow>(
        "SELECT id, run_id, store_name, query, status, fetched, dropped, inserted, updated, \
                error_message, created_at \
         FROM ingestion_batches \
         WHERE run_id = ?1 \
         ORDER BY id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
