//! The `ingest` command: drives every selected store through every query,
//! one store and one query at a time, persisting each batch independently.
//!
//! A failing batch is recorded and skipped so the rest of the run proceeds.
//! Only run-level bookkeeping failures or a run where every batch failed
//! surface as errors to the caller.

mod batch;
mod queries;

use std::path::PathBuf;
use std::time::Duration;

use pricewatch_core::{AppConfig, StoreConfig, StoresFile};
use pricewatch_db::BatchStatus;
use pricewatch_ingest::{build_adapter, FeedAdapter, HttpSettings};
use sqlx::SqlitePool;

use batch::{persist_outcome, record_failed_batch, BatchReport};

pub(crate) use queries::{resolve_queries, DEFAULT_QUERIES};

/// Label recorded for a batch that was not narrowed by a query.
const UNFILTERED: &str = "*";

/// Who started a run; persisted as `ingestion_runs.trigger_source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TriggerSource {
    Cli,
    Scheduler,
}

impl TriggerSource {
    fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Cli => "cli",
            TriggerSource::Scheduler => "scheduler",
        }
    }
}

/// Transport and pacing settings for a run.
#[derive(Debug, Clone)]
pub(crate) struct RunnerSettings {
    pub http: HttpSettings,
    /// Pause between two consecutive live fetches.
    pub inter_query_delay: Duration,
}

impl RunnerSettings {
    pub(crate) fn from_app_config(config: &AppConfig) -> Self {
        Self {
            http: HttpSettings::from_app_config(config),
            inter_query_delay: Duration::from_millis(config.inter_query_delay_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct IngestOptions {
    /// Empty means no query filter, one batch per store.
    pub queries: Vec<String>,
    pub limit: usize,
    /// Local feed export to ingest instead of fetching live.
    pub file: Option<PathBuf>,
    pub dry_run: bool,
    pub trigger: TriggerSource,
}

/// Totals across every batch of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub batches: usize,
    pub failed_batches: usize,
    pub skipped_batches: usize,
    pub fetched: usize,
    pub dropped: usize,
    pub inserted: usize,
    pub updated: usize,
}

impl RunSummary {
    fn add(&mut self, report: &BatchReport) {
        self.batches += 1;
        match report.status {
            BatchStatus::Failed => self.failed_batches += 1,
            BatchStatus::Skipped => self.skipped_batches += 1,
            BatchStatus::Succeeded | BatchStatus::Partial => {}
        }
        self.fetched += report.fetched;
        self.dropped += report.dropped;
        self.inserted += report.inserted;
        self.updated += report.updated;
    }

    fn records_processed(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Resolves `--store` keys against the stores file.
///
/// No keys selects every enabled store. A named store runs even when it is
/// disabled in the file.
///
/// # Errors
///
/// Returns an error naming the first key that matches no configured store.
pub(crate) fn select_stores(
    stores_file: &StoresFile,
    keys: &[String],
) -> anyhow::Result<Vec<StoreConfig>> {
    if keys.is_empty() {
        return Ok(stores_file.enabled().cloned().collect());
    }

    keys.iter()
        .map(|key| {
            let store = stores_file
                .find(key)
                .ok_or_else(|| anyhow::anyhow!("unknown store key '{key}'"))?;
            if !store.enabled {
                tracing::info!(store = %store.name, "store is disabled but was selected explicitly");
            }
            Ok(store.clone())
        })
        .collect()
}

/// Runs one ingestion over `stores`, recording the run and its batches.
///
/// # Errors
///
/// Returns an error if the run cannot be created or finalized, the `--file`
/// input cannot be read or targets a non-feed store, or every batch failed.
pub(crate) async fn run_ingestion(
    pool: &SqlitePool,
    settings: &RunnerSettings,
    stores: &[StoreConfig],
    options: &IngestOptions,
) -> anyhow::Result<RunSummary> {
    if stores.is_empty() {
        println!("no stores selected for ingestion; skipping run creation");
        return Ok(RunSummary::default());
    }

    let queries: Vec<Option<&str>> = if options.queries.is_empty() {
        vec![None]
    } else {
        options.queries.iter().map(|q| Some(q.as_str())).collect()
    };

    if options.dry_run {
        print_plan(stores, &queries, options);
        return Ok(RunSummary::default());
    }

    let file_content = match &options.file {
        Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("failed to read feed file {}: {e}", path.display())
        })?),
        None => None,
    };

    let run = pricewatch_db::create_ingestion_run(pool, options.trigger.as_str()).await?;
    if let Err(e) = pricewatch_db::start_ingestion_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, format!("{e:#}")).await;
        return Err(e.into());
    }
    tracing::info!(
        run_id = run.id,
        public_id = %run.public_id,
        stores = stores.len(),
        queries = queries.len(),
        trigger = options.trigger.as_str(),
        "ingestion run started"
    );

    let result = match file_content {
        Some(content) => {
            ingest_file(pool, run.id, settings, stores, &queries, &content, options.limit).await
        }
        None => Ok(ingest_live(pool, run.id, settings, stores, &queries, options.limit).await),
    };

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            fail_run_best_effort(pool, run.id, format!("{e:#}")).await;
            return Err(e);
        }
    };

    if summary.batches > 0 && summary.failed_batches == summary.batches {
        let message = format!("all {} batches failed", summary.batches);
        fail_run_best_effort(pool, run.id, message.clone()).await;
        anyhow::bail!("{message}");
    }

    if let Err(err) =
        pricewatch_db::complete_ingestion_run(pool, run.id, summary.records_processed()).await
    {
        fail_run_best_effort(pool, run.id, format!("{err:#}")).await;
        return Err(err.into());
    }

    tracing::info!(
        run_id = run.id,
        batches = summary.batches,
        failed = summary.failed_batches,
        skipped = summary.skipped_batches,
        inserted = summary.inserted,
        updated = summary.updated,
        dropped = summary.dropped,
        "ingestion run complete"
    );
    Ok(summary)
}

async fn ingest_live(
    pool: &SqlitePool,
    run_id: i64,
    settings: &RunnerSettings,
    stores: &[StoreConfig],
    queries: &[Option<&str>],
    limit: usize,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let mut first_fetch = true;

    for store in stores {
        let adapter = match build_adapter(store, &settings.http) {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::error!(store = %store.name, error = %e, "failed to build adapter");
                let report =
                    record_failed_batch(pool, run_id, store, UNFILTERED, &e.to_string()).await;
                summary.add(&report);
                continue;
            }
        };

        for query in queries {
            if !first_fetch && !settings.inter_query_delay.is_zero() {
                tokio::time::sleep(settings.inter_query_delay).await;
            }
            first_fetch = false;

            tracing::info!(store = %store.name, query = query.unwrap_or(UNFILTERED), "fetching");
            let outcome = adapter.fetch_products(*query, None, limit).await;
            let report = persist_outcome(pool, run_id, store, *query, &outcome).await;
            summary.add(&report);
        }
    }

    summary
}

async fn ingest_file(
    pool: &SqlitePool,
    run_id: i64,
    settings: &RunnerSettings,
    stores: &[StoreConfig],
    queries: &[Option<&str>],
    content: &str,
    limit: usize,
) -> anyhow::Result<RunSummary> {
    let [store] = stores else {
        anyhow::bail!("--file requires exactly one --store");
    };
    let feed = FeedAdapter::from_config(store, &settings.http)?;

    let mut summary = RunSummary::default();
    for query in queries {
        let outcome = feed.products_from_content(content, *query, None, limit);
        let report = persist_outcome(pool, run_id, store, *query, &outcome).await;
        summary.add(&report);
    }
    Ok(summary)
}

fn print_plan(stores: &[StoreConfig], queries: &[Option<&str>], options: &IngestOptions) {
    let labels: Vec<&str> = queries.iter().map(|q| q.unwrap_or(UNFILTERED)).collect();
    let source = options
        .file
        .as_ref()
        .map_or_else(|| "live".to_string(), |p| format!("file {}", p.display()));
    println!(
        "dry-run: would ingest {} stores x {} queries (limit {}, {source})",
        stores.len(),
        labels.len(),
        options.limit,
    );
    for store in stores {
        println!("  {} [{}]: {}", store.name, store.adapter, labels.join(", "));
    }
}

/// Attempt to mark an ingestion run as failed, logging any secondary error.
async fn fail_run_best_effort(pool: &SqlitePool, run_id: i64, message: String) {
    if let Err(mark_err) = pricewatch_db::fail_ingestion_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark ingestion run as failed"
        );
    }
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
