//! Bounded poll loop for async scan results.
//!
//! After an accepted submission the verdict becomes available on the
//! result endpoint at some later point. The loop queries on a fixed
//! interval until the verdict appears or the deadline passes. Each
//! not-ready cycle is a full cooperative sleep, so the loop never
//! busy-spins, and a process signal still terminates the host process
//! mid-wait.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{GateError, GateResult};
use crate::scanner::{AsyncJob, ScanClient, ScanVerdict};

/// Interval and deadline configuration for the poll loop.
///
/// Both values are validated into [1, 3600] seconds by configuration
/// loading before they reach this point.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Sleep between result queries.
    pub interval: Duration,

    /// Total time allowed from submission to verdict.
    pub timeout: Duration,
}

/// Polls the scanning service until the job's verdict is available.
pub async fn poll_until_verdict(
    client: &ScanClient,
    job: &AsyncJob,
    settings: PollSettings,
) -> GateResult<ScanVerdict> {
    let client = client.clone();
    let trace_id = job.trace_id;
    poll_with(settings, job.submitted_at, move || {
        let client = client.clone();
        async move { client.fetch_result(&trace_id).await }
    })
    .await
}

/// Poll-loop state machine, generic over the fetch operation so tests can
/// drive it with simulated time.
///
/// `fetch` returns `Ok(None)` while the verdict is not ready. Any error
/// aborts the loop immediately; there is no retry for failed fetches.
/// When the next query would start at or past the deadline the loop sleeps
/// out the remaining time and fails with [`GateError::PollTimeout`], so a
/// verdict that materializes after the deadline is never observed.
pub(crate) async fn poll_with<F, Fut>(
    settings: PollSettings,
    submitted_at: Instant,
    mut fetch: F,
) -> GateResult<ScanVerdict>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GateResult<Option<ScanVerdict>>>,
{
    let deadline = submitted_at + settings.timeout;
    let mut attempts: u32 = 0;

    loop {
        let now = Instant::now();
        if now >= deadline {
            let elapsed = now.duration_since(submitted_at);
            tracing::warn!(
                attempts,
                elapsed_secs = elapsed.as_secs(),
                "gave up waiting for async scan verdict"
            );
            return Err(GateError::PollTimeout {
                elapsed_secs: elapsed.as_secs(),
            });
        }

        attempts += 1;
        match fetch().await? {
            Some(verdict) => {
                tracing::debug!(attempts, "async scan verdict available");
                return Ok(verdict);
            }
            None => {
                let remaining = deadline.duration_since(Instant::now());
                let wait = settings.interval.min(remaining);
                tracing::debug!(
                    attempts,
                    wait_secs = wait.as_secs(),
                    "scan verdict not ready yet"
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}
