//! Request admission and retry utilities.
//!
//! [`RateLimiter`] is the per-adapter sliding-window gate that keeps API
//! adapters inside provider quotas. [`retry_with_backoff`] wraps the HTML
//! fetch path, which is the only path that retries transient failures.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::IngestError;

/// Sliding-window admission control: at most `limit` requests per `window`.
///
/// The timestamp log is held under a mutex for the whole check-wait-record
/// step, so two concurrent callers cannot both see room and jointly exceed
/// the limit. State is in-process only and resets on restart.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    log: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limiter allowing `requests_per_second` requests in any 1-second window.
    /// A limit of zero is treated as one.
    #[must_use]
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::new(requests_per_second, Duration::from_secs(1))
    }

    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        let limit = usize::try_from(limit.max(1)).unwrap_or(usize::MAX);
        Self {
            limit,
            window,
            log: Mutex::new(VecDeque::with_capacity(limit.min(64))),
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Waits until a request may be issued, then records it.
    pub async fn acquire(&self) {
        let mut log = self.log.lock().await;
        self.prune(&mut log, Instant::now());

        if log.len() >= self.limit {
            if let Some(&oldest) = log.front() {
                let wait = self.window.saturating_sub(oldest.elapsed());
                if !wait.is_zero() {
                    tracing::debug!(
                        wait_ms = wait.as_millis(),
                        limit = self.limit,
                        "rate limit reached, waiting for window"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
            self.prune(&mut log, Instant::now());
        }

        log.push_back(Instant::now());
    }

    fn prune(&self, log: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = log.front() {
            if now.duration_since(front) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
///
/// Retriable errors:
/// - [`IngestError::RateLimited`]: HTTP 429; the server has asked us to back off.
/// - [`IngestError::Http`]: network-level failure (connection reset, timeout).
///
/// Everything else is terminal: a 404 or unexpected status will not change
/// on retry, and neither will an unparseable body.
fn is_retriable(err: &IngestError) -> bool {
    matches!(
        err,
        IngestError::RateLimited { .. } | IngestError::Http(_)
    )
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// On a retriable error the function sleeps for roughly
/// `backoff_base_secs * 2^attempt` seconds (±25% jitter, capped at 60 s) and
/// tries again, up to `max_retries` additional attempts after the first try.
/// If all retries are exhausted the last error is returned.
///
/// | Attempt | Sleep before next attempt (`backoff_base_secs = 1`) |
/// |---------|------------------------------------------------------|
/// | 0 (initial) | none |
/// | 1 (first retry) | ~1 s |
/// | 2 (second retry) | ~2 s |
/// | 3 (third retry) | ~4 s |
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, IngestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IngestError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }

                let computed = backoff_base_secs
                    .saturating_mul(1000)
                    .saturating_mul(1u64 << attempt.min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient fetch error, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}
