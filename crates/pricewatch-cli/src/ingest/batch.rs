//! Persistence of one store x query batch.

use pricewatch_core::StoreConfig;
use pricewatch_db::{BatchStatus, NewIngestionBatch, StoreBatch, UpsertReport};
use pricewatch_ingest::{FetchOutcome, FetchStatus};
use sqlx::SqlitePool;

use super::queries::category_for_query;
use super::UNFILTERED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct BatchReport {
    pub status: BatchStatus,
    pub fetched: usize,
    pub dropped: usize,
    pub inserted: usize,
    pub updated: usize,
}

fn batch_status(status: &FetchStatus) -> BatchStatus {
    match status {
        FetchStatus::Complete => BatchStatus::Succeeded,
        FetchStatus::Partial(_) => BatchStatus::Partial,
        FetchStatus::NotConfigured(_) | FetchStatus::Unsupported(_) => BatchStatus::Skipped,
        FetchStatus::Failed(_) => BatchStatus::Failed,
    }
}

fn status_reason(status: &FetchStatus) -> Option<&str> {
    match status {
        FetchStatus::Complete => None,
        FetchStatus::Partial(reason)
        | FetchStatus::NotConfigured(reason)
        | FetchStatus::Unsupported(reason)
        | FetchStatus::Failed(reason) => Some(reason),
    }
}

/// Upserts the records of `outcome` and records the batch.
///
/// The store row is created on the first batch that commits records, and the
/// query's mapped category the same way. A persistence error rolls back the
/// whole batch, store and category included; it is logged and recorded as a
/// failed batch.
pub(super) async fn persist_outcome(
    pool: &SqlitePool,
    run_id: i64,
    store: &StoreConfig,
    query: Option<&str>,
    outcome: &FetchOutcome,
) -> BatchReport {
    let label = query.unwrap_or(UNFILTERED);
    let mut status = batch_status(&outcome.status);
    let mut error_message = status_reason(&outcome.status).map(ToString::to_string);
    let mut report = UpsertReport::default();

    if outcome.dropped > 0 {
        tracing::info!(
            store = %store.name,
            query = label,
            dropped = outcome.dropped,
            "records dropped by validation"
        );
    }

    if !outcome.products.is_empty() {
        let category = query.and_then(category_for_query);
        let store_batch = StoreBatch {
            store_name: &store.name,
            store_url: &store.url,
            category,
            products: &outcome.products,
        };
        match pricewatch_db::ingest_batch(pool, &store_batch).await {
            Ok(upserted) => {
                report = upserted;
                tracing::info!(
                    store = %store.name,
                    query = label,
                    inserted = report.inserted,
                    updated = report.updated,
                    status = %outcome.status,
                    "batch persisted"
                );
            }
            Err(e) => {
                tracing::error!(
                    store = %store.name,
                    query = label,
                    records = outcome.products.len(),
                    error = %e,
                    "batch rolled back"
                );
                status = BatchStatus::Failed;
                error_message = Some(e.to_string());
            }
        }
    } else if status == BatchStatus::Succeeded {
        tracing::info!(store = %store.name, query = label, "no products found");
    }

    let batch = BatchReport {
        status,
        fetched: outcome.products.len() + outcome.dropped,
        dropped: outcome.dropped,
        inserted: report.inserted,
        updated: report.updated,
    };
    record(pool, run_id, store, label, &batch, error_message.as_deref()).await;
    batch
}

/// Records a batch that failed before anything could be fetched.
pub(super) async fn record_failed_batch(
    pool: &SqlitePool,
    run_id: i64,
    store: &StoreConfig,
    label: &str,
    error_message: &str,
) -> BatchReport {
    let batch = BatchReport {
        status: BatchStatus::Failed,
        fetched: 0,
        dropped: 0,
        inserted: 0,
        updated: 0,
    };
    record(pool, run_id, store, label, &batch, Some(error_message)).await;
    batch
}

/// Bookkeeping failures are logged; they never fail the batch itself.
async fn record(
    pool: &SqlitePool,
    run_id: i64,
    store: &StoreConfig,
    label: &str,
    batch: &BatchReport,
    error_message: Option<&str>,
) {
    let row = NewIngestionBatch {
        store_name: &store.name,
        query: label,
        status: batch.status,
        fetched: batch.fetched,
        dropped: batch.dropped,
        inserted: batch.inserted,
        updated: batch.updated,
        error_message,
    };
    if let Err(e) = pricewatch_db::record_ingestion_batch(pool, run_id, &row).await {
        tracing::error!(
            run_id,
            store = %store.name,
            query = label,
            error = %e,
            "failed to record ingestion batch"
        );
    }
}
