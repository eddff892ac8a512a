//! Bounded concurrent download queue.
//!
//! A fixed pool of workers drains a FIFO of (URL, destination) jobs, hands
//! each one to a [`Fetcher`], and records the outcome in a [`Ledger`].
//!
//! # Overview
//!
//! The queue system consists of:
//! - [`DownloadQueue`] - Handle for enqueueing, closing, and draining
//! - [`Job`] / [`Outcome`] / [`JobResult`] - Units of work and their results
//! - [`RecordingPolicy`] - Which outcomes the ledger keeps
//! - [`QueueConfig`] - Worker count, policy, and pacing
//! - [`QueueError`] - Intake and construction errors
//! - [`FetchError`] - Opaque per-job failure stored in the ledger
//!
//! # Lifecycle
//!
//! `Open` (accepting jobs) → [`close`](DownloadQueue::close) → `Draining`
//! (no new jobs, workers finish what is pending) → `Done` (all workers
//! exited, ledger final).
//!
//! # Example
//!
//! ```no_run
//! use fetchq_core::download::HttpClient;
//! use fetchq_core::queue::{DownloadQueue, QueueConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = DownloadQueue::new(QueueConfig::with_workers(2), HttpClient::new())?;
//! queue.enqueue("https://example.com/a.png", "tmp/0.png")?;
//! queue.enqueue("https://example.com/b.png", "tmp/1.png")?;
//! queue.wait_until_done().await;
//!
//! for failure in queue.failures() {
//!     eprintln!("{failure}");
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod fetcher;
mod job;
mod ledger;
mod worker;

pub use config::{DEFAULT_IDLE_BACKOFF, DEFAULT_WORKER_COUNT, MIN_IDLE_BACKOFF, QueueConfig};
pub use error::{FetchError, QueueError};
pub use fetcher::Fetcher;
pub use job::{Job, JobResult, Outcome};
pub use ledger::{Ledger, RecordingPolicy};

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use worker::WorkerTiming;

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Point-in-time lifecycle stage of a [`DownloadQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Accepting jobs.
    Open,
    /// Closed to new jobs; workers are still running.
    Draining,
    /// Closed and every worker has exited.
    Done,
}

/// What a worker found when it looked at the queue.
pub(crate) enum Next {
    Job(Job),
    /// Nothing pending, still open.
    Empty,
    /// Nothing pending and closed: time to exit.
    Drained,
}

/// State shared between the handle and its workers.
///
/// Pending jobs, the closed flag, and the ledger are guarded separately. The
/// closed flag is only ever set while holding the pending lock, which orders
/// every enqueue either before the close or after it.
#[derive(Debug)]
pub(crate) struct Shared {
    pending: Mutex<VecDeque<Job>>,
    closed: AtomicBool,
    live_workers: AtomicUsize,
    pub(crate) ledger: Ledger,
    pub(crate) wake: Notify,
}

impl Shared {
    fn new(config: &QueueConfig) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            live_workers: AtomicUsize::new(0),
            ledger: Ledger::new(config.recording_policy),
            wake: Notify::new(),
        }
    }

    // Each critical section is a single push/pop/flag write.
    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, job: Job) -> Result<()> {
        let mut pending = self.lock_pending();
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        pending.push_back(job);
        drop(pending);
        self.wake.notify_one();
        Ok(())
    }

    /// Removes the head job. When there is none, reports whether the queue is
    /// also closed, read under the same lock as the pop.
    pub(crate) fn take_next(&self) -> Next {
        let mut pending = self.lock_pending();
        match pending.pop_front() {
            Some(job) => Next::Job(job),
            None if self.closed.load(Ordering::Acquire) => Next::Drained,
            None => Next::Empty,
        }
    }

    /// Sets the closed flag. Returns `true` for the call that closed it.
    fn close(&self) -> bool {
        let pending = self.lock_pending();
        let newly_closed = !self.closed.swap(true, Ordering::AcqRel);
        drop(pending);
        if newly_closed {
            self.wake.notify_waiters();
        }
        newly_closed
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn worker_exited(&self) {
        self.live_workers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A bounded pool of workers draining a FIFO of download jobs.
///
/// All methods except [`wait_until_done`](Self::wait_until_done) are
/// synchronous and non-blocking, and may be called from any task, including
/// from inside a [`Fetcher`].
///
/// Dropping the handle closes the queue; workers finish the remaining jobs
/// in the background.
#[derive(Debug)]
pub struct DownloadQueue {
    shared: Arc<Shared>,
    config: QueueConfig,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl DownloadQueue {
    /// Validates `config` and starts exactly `config.worker_count` workers.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidWorkerCount`] for zero workers and
    /// [`QueueError::NoRuntime`] when called outside a tokio runtime.
    #[instrument(level = "debug", skip(fetcher))]
    pub fn new<F>(config: QueueConfig, fetcher: F) -> Result<Self>
    where
        F: Fetcher + 'static,
    {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| QueueError::NoRuntime)?;

        let shared = Arc::new(Shared::new(&config));
        let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);
        let timing = WorkerTiming {
            inter_job_delay: config.inter_job_delay,
            idle_backoff: config.effective_idle_backoff(),
        };

        shared
            .live_workers
            .store(config.worker_count, Ordering::Release);
        let workers = (0..config.worker_count)
            .map(|worker_id| {
                runtime.spawn(worker::run(
                    worker_id,
                    Arc::clone(&shared),
                    Arc::clone(&fetcher),
                    timing,
                ))
            })
            .collect();

        debug!(
            workers = config.worker_count,
            inter_job_delay_ms = config.inter_job_delay.as_millis(),
            record_successes = config.recording_policy.record_successes,
            record_failures = config.recording_policy.record_failures,
            "download queue started"
        );

        Ok(Self {
            shared,
            config,
            workers: tokio::sync::Mutex::new(workers),
        })
    }

    /// Appends a job to the tail of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] once the queue has been closed; the
    /// queue is left unchanged.
    pub fn enqueue(&self, url: impl Into<String>, destination: impl Into<PathBuf>) -> Result<()> {
        let job = Job::new(url, destination);
        debug!(url = %job.url(), destination = %job.destination().display(), "enqueue");
        self.shared.push(job)
    }

    /// Stops intake. Idempotent; pending jobs are still processed.
    pub fn close(&self) {
        if self.shared.close() {
            debug!(pending = self.pending_len(), "download queue closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    #[must_use]
    pub fn state(&self) -> QueueState {
        if !self.shared.is_closed() {
            QueueState::Open
        } else if self.shared.live_workers.load(Ordering::Acquire) > 0 {
            QueueState::Draining
        } else {
            QueueState::Done
        }
    }

    /// Number of jobs not yet taken by a worker.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.shared.lock_pending().len()
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Closes the queue and waits until every worker has exited.
    ///
    /// On return no job is pending or in flight and the ledger is final.
    /// Safe to call repeatedly and from several tasks at once; later calls
    /// wait for the same completion and never re-process anything.
    #[instrument(skip(self))]
    pub async fn wait_until_done(&self) {
        self.close();

        let mut workers = self.workers.lock().await;
        // Pop only after a handle resolves so a cancelled wait keeps the rest.
        while let Some(handle) = workers.last_mut() {
            if let Err(e) = handle.await {
                warn!(error = %e, "download worker terminated abnormally");
            }
            workers.pop();
        }
        drop(workers);

        info!(
            recorded = self.shared.ledger.len(),
            failures = self.shared.ledger.failures().len(),
            "download queue drained"
        );
    }

    /// Snapshot of every recorded result.
    #[must_use]
    pub fn all_results(&self) -> Vec<JobResult> {
        self.shared.ledger.all_results()
    }

    /// Snapshot of recorded successes.
    #[must_use]
    pub fn successes(&self) -> Vec<JobResult> {
        self.shared.ledger.successes()
    }

    /// Snapshot of recorded failures.
    #[must_use]
    pub fn failures(&self) -> Vec<JobResult> {
        self.shared.ledger.failures()
    }
}

impl Drop for DownloadQueue {
    fn drop(&mut self) {
        self.shared.close();
    }
}
