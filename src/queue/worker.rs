//! Worker loop: pull a job, fetch it, record the outcome, repeat.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tracing::{debug, info, instrument, warn};

use super::error::FetchError;
use super::fetcher::Fetcher;
use super::job::{Job, JobResult, Outcome};
use super::{Next, Shared};

/// Per-worker timing knobs copied out of the queue config.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerTiming {
    pub(crate) inter_job_delay: Duration,
    pub(crate) idle_backoff: Duration,
}

/// Decrements the live-worker count however the worker ends.
struct LiveGuard<'a>(&'a Shared);

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.worker_exited();
    }
}

/// Runs one worker until the queue is closed and empty.
///
/// An idle worker waits for an enqueue/close wake-up, but never longer than
/// `idle_backoff` before looking at the queue again.
#[instrument(name = "worker", skip(shared, fetcher, timing))]
pub(crate) async fn run(
    worker_id: usize,
    shared: Arc<Shared>,
    fetcher: Arc<dyn Fetcher>,
    timing: WorkerTiming,
) {
    let _live = LiveGuard(&shared);
    let mut processed = 0usize;
    debug!("worker started");

    loop {
        let job = {
            // Registered before looking at the queue so a wake-up sent between
            // the check and the wait is not lost. Dropped before fetching, which
            // hands any wake-up it caught on to an idle worker.
            let notified = shared.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match shared.take_next() {
                Next::Job(job) => job,
                Next::Empty => {
                    let _ = tokio::time::timeout(timing.idle_backoff, notified).await;
                    continue;
                }
                Next::Drained => break,
            }
        };

        let outcome = fetch_once(fetcher.as_ref(), &job).await;
        log_outcome(&job, &outcome);
        shared.ledger.record(JobResult::new(job, outcome));
        processed += 1;

        if !timing.inter_job_delay.is_zero() {
            tokio::time::sleep(timing.inter_job_delay).await;
        }
    }

    debug!(processed, "worker exiting");
}

/// Makes the single fetch attempt for `job`. A panic inside the fetcher
/// becomes a failure outcome instead of killing the worker.
async fn fetch_once(fetcher: &dyn Fetcher, job: &Job) -> Outcome {
    debug!(url = %job.url(), destination = %job.destination().display(), "fetching");

    let attempt = AssertUnwindSafe(fetcher.fetch(job.url(), job.destination()))
        .catch_unwind()
        .await;

    match attempt {
        Ok(result) => Outcome::from_fetch(result),
        Err(payload) => Outcome::from_fetch(Err(FetchError::panicked(
            job.url(),
            panic_message(payload.as_ref()),
        ))),
    }
}

fn log_outcome(job: &Job, outcome: &Outcome) {
    match outcome.error() {
        None => info!(url = %job.url(), destination = %job.destination().display(), "job completed"),
        Some(error) => warn!(
            url = %job.url(),
            destination = %job.destination().display(),
            error = %error,
            "job failed"
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
