//! Job, outcome, and result types flowing through the queue.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::error::FetchError;

/// One requested download: a URL and where its body should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    url: String,
    destination: PathBuf,
}

impl Job {
    /// Creates a job for `url` written to `destination`.
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
        }
    }

    /// The URL to fetch.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The destination path.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Result of the single fetch attempt made for a job.
///
/// The error is shared behind an `Arc` so ledger snapshots can be cloned
/// without copying or re-creating it.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The fetch completed.
    Success,
    /// The fetch failed with the fetcher's error, stored verbatim.
    Failure(Arc<FetchError>),
}

impl Outcome {
    /// Builds an outcome from a fetcher return value.
    #[must_use]
    pub fn from_fetch(result: Result<(), FetchError>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(error) => Self::Failure(Arc::new(error)),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The failure error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Success => None,
            Self::Failure(error) => Some(error.as_ref()),
        }
    }
}

/// A processed job together with its outcome. Immutable once built.
#[derive(Debug, Clone)]
pub struct JobResult {
    job: Job,
    outcome: Outcome,
}

impl JobResult {
    #[must_use]
    pub fn new(job: Job, outcome: Outcome) -> Self {
        Self { job, outcome }
    }

    #[must_use]
    pub fn job(&self) -> &Job {
        &self.job
    }

    #[must_use]
    pub fn url(&self) -> &str {
        self.job.url()
    }

    #[must_use]
    pub fn destination(&self) -> &Path {
        self.job.destination()
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dst = self.destination().display();
        match &self.outcome {
            Outcome::Success => write!(f, "downloaded {} -> {dst}", self.url()),
            Outcome::Failure(err) => {
                write!(f, "downloading {} -> {dst} failed: {err}", self.url())
            }
        }
    }
}

/// Flat, serializable view of a [`JobResult`].
#[derive(Serialize)]
struct JobReport<'a> {
    url: &'a str,
    destination: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Serialize for JobResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        JobReport {
            url: self.url(),
            destination: self.destination().display().to_string(),
            status: if self.is_success() { "success" } else { "failure" },
            error: self.outcome.error().map(ToString::to_string),
        }
        .serialize(serializer)
    }
}
