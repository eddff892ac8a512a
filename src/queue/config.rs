//! Queue construction settings.

use std::time::Duration;

use super::error::QueueError;
use super::ledger::RecordingPolicy;

/// Default number of workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// How long an idle worker waits for a wake-up before re-checking the queue.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(200);

/// Shortest idle backoff a worker will use; smaller values are raised to it.
pub const MIN_IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Configuration for a [`DownloadQueue`](super::DownloadQueue).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use fetchq_core::queue::{QueueConfig, RecordingPolicy};
///
/// let config = QueueConfig::with_workers(3)
///     .with_recording_policy(RecordingPolicy::all())
///     .with_inter_job_delay(Duration::from_millis(250));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Number of workers started at construction (at least 1). Never resized.
    pub worker_count: usize,
    /// Which outcomes are kept in the ledger.
    pub recording_policy: RecordingPolicy,
    /// Pause a worker takes after each completed job. Zero disables it.
    pub inter_job_delay: Duration,
    /// Upper bound on how long an idle worker sleeps between queue checks.
    /// Clamped to [`MIN_IDLE_BACKOFF`].
    pub idle_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            recording_policy: RecordingPolicy::default(),
            inter_job_delay: Duration::ZERO,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }
}

impl QueueConfig {
    /// Default configuration with `worker_count` workers.
    #[must_use]
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_recording_policy(mut self, policy: RecordingPolicy) -> Self {
        self.recording_policy = policy;
        self
    }

    #[must_use]
    pub fn with_inter_job_delay(mut self, delay: Duration) -> Self {
        self.inter_job_delay = delay;
        self
    }

    #[must_use]
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    /// Checks the values a queue cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidWorkerCount`] for zero workers.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.worker_count == 0 {
            return Err(QueueError::InvalidWorkerCount {
                value: self.worker_count,
            });
        }
        Ok(())
    }

    /// The idle backoff workers actually use.
    #[must_use]
    pub fn effective_idle_backoff(&self) -> Duration {
        self.idle_backoff.max(MIN_IDLE_BACKOFF)
    }
}
