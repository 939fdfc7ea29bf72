//! Recurring ingestion.
//!
//! [`IngestScheduler`] owns its [`JobScheduler`]; the `schedule` command
//! builds one, keeps it alive until shutdown, then stops it. A trigger that
//! fires while the previous run is still in flight is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pricewatch_core::StoreConfig;
use sqlx::SqlitePool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::ingest::{run_ingestion, IngestOptions, RunnerSettings};

/// Admits one ingestion at a time.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunGuard {
    in_flight: Arc<AtomicBool>,
}

/// Held for the duration of a run; releases the guard on drop.
#[derive(Debug)]
pub(crate) struct RunPermit {
    in_flight: Arc<AtomicBool>,
}

impl RunGuard {
    /// `None` while another permit is alive.
    pub(crate) fn try_begin(&self) -> Option<RunPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                in_flight: Arc::clone(&self.in_flight),
            })
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Everything one scheduled trigger needs to run an ingestion.
pub(crate) struct ScheduledIngest {
    pub pool: SqlitePool,
    pub settings: RunnerSettings,
    pub stores: Vec<StoreConfig>,
    pub options: IngestOptions,
    pub guard: RunGuard,
}

impl ScheduledIngest {
    /// Runs one ingestion unless one is already in flight.
    ///
    /// Returns `false` when the trigger was skipped. Run errors are logged.
    pub(crate) async fn run_once(&self) -> bool {
        let Some(_permit) = self.guard.try_begin() else {
            tracing::warn!("scheduler: previous ingestion still running; skipping trigger");
            return false;
        };

        tracing::info!("scheduler: starting ingestion run");
        match run_ingestion(&self.pool, &self.settings, &self.stores, &self.options).await {
            Ok(summary) => tracing::info!(
                batches = summary.batches,
                inserted = summary.inserted,
                updated = summary.updated,
                "scheduler: ingestion run complete"
            ),
            Err(e) => tracing::error!(error = %e, "scheduler: ingestion run failed"),
        }
        true
    }
}

pub(crate) struct IngestScheduler {
    scheduler: JobScheduler,
}

impl IngestScheduler {
    /// Registers the ingestion job on `cron` (six fields, seconds first).
    ///
    /// # Errors
    ///
    /// Returns [`JobSchedulerError`] if the scheduler cannot be created or
    /// `cron` does not parse.
    pub(crate) async fn build(
        job: Arc<ScheduledIngest>,
        cron: &str,
    ) -> Result<Self, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;

        let ingest = Job::new_async(cron, move |_uuid, _lock| {
            let job = Arc::clone(&job);
            Box::pin(async move {
                job.run_once().await;
            })
        })?;
        scheduler.add(ingest).await?;

        tracing::info!(cron, "scheduler: ingestion job registered");
        Ok(Self { scheduler })
    }

    /// # Errors
    ///
    /// Returns [`JobSchedulerError`] if the scheduler fails to start.
    pub(crate) async fn start(&self) -> Result<(), JobSchedulerError> {
        self.scheduler.start().await
    }

    /// Stops triggering new runs. A run already in flight is not cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`JobSchedulerError`] if the scheduler fails to shut down.
    pub(crate) async fn shutdown(mut self) -> Result<(), JobSchedulerError> {
        self.scheduler.shutdown().await
    }
}
