//! Append-only store of job results, filtered by a recording policy.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::job::{JobResult, Outcome};

/// Selects which outcome kinds are worth keeping.
///
/// Outcomes the policy rejects are dropped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingPolicy {
    pub record_successes: bool,
    pub record_failures: bool,
}

impl Default for RecordingPolicy {
    /// Failures only.
    fn default() -> Self {
        Self::failures_only()
    }
}

impl RecordingPolicy {
    #[must_use]
    pub const fn failures_only() -> Self {
        Self {
            record_successes: false,
            record_failures: true,
        }
    }

    #[must_use]
    pub const fn all() -> Self {
        Self {
            record_successes: true,
            record_failures: true,
        }
    }

    #[must_use]
    pub const fn none() -> Self {
        Self {
            record_successes: false,
            record_failures: false,
        }
    }

    /// Whether `outcome` should be kept.
    #[must_use]
    pub fn permits(&self, outcome: &Outcome) -> bool {
        match outcome {
            Outcome::Success => self.record_successes,
            Outcome::Failure(_) => self.record_failures,
        }
    }
}

/// Concurrency-safe ledger of [`JobResult`]s.
///
/// Readers always get snapshots; entry order reflects completion order, which
/// across several workers need not match enqueue order.
#[derive(Debug, Default)]
pub struct Ledger {
    policy: RecordingPolicy,
    entries: Mutex<Vec<JobResult>>,
}

impl Ledger {
    #[must_use]
    pub fn new(policy: RecordingPolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Appends `result` if the policy permits it. Returns whether it was kept.
    pub fn record(&self, result: JobResult) -> bool {
        if !self.policy.permits(result.outcome()) {
            return false;
        }
        self.lock().push(result);
        true
    }

    /// Snapshot of every recorded result.
    #[must_use]
    pub fn all_results(&self) -> Vec<JobResult> {
        self.lock().clone()
    }

    /// Snapshot of recorded successes.
    #[must_use]
    pub fn successes(&self) -> Vec<JobResult> {
        self.filtered(JobResult::is_success)
    }

    /// Snapshot of recorded failures.
    #[must_use]
    pub fn failures(&self) -> Vec<JobResult> {
        self.filtered(JobResult::is_failure)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn filtered(&self, keep: fn(&JobResult) -> bool) -> Vec<JobResult> {
        self.lock().iter().filter(|r| keep(r)).cloned().collect()
    }

    // Pushes never leave a half-written entry, so a poisoned lock is still
    // safe to read.
    fn lock(&self) -> MutexGuard<'_, Vec<JobResult>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
