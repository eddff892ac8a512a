//! Error types for queue operations and fetch failures.

use std::error::Error as StdError;

use thiserror::Error;

/// Errors returned by [`DownloadQueue`](super::DownloadQueue) operations.
///
/// Job-level failures are never reported here; they live in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue has been closed and no longer accepts jobs.
    #[error("download queue is closed")]
    Closed,

    /// A queue needs at least one worker.
    #[error("invalid worker count {value}: at least one worker is required")]
    InvalidWorkerCount {
        /// The rejected value.
        value: usize,
    },

    /// Workers are tokio tasks, so the queue must be built inside a runtime.
    #[error("download queue must be created from within a tokio runtime")]
    NoRuntime,
}

/// Failure of a single fetch, as stored in the ledger.
///
/// The queue treats the fetcher's error as opaque: it is boxed, displayed,
/// and handed back to callers, who may [`downcast_ref`](Self::downcast_ref)
/// it to the concrete type their fetcher produces.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Error returned by the fetcher.
    #[error(transparent)]
    Fetcher(Box<dyn StdError + Send + Sync>),

    /// The fetcher panicked; the worker contained the panic.
    #[error("fetcher panicked downloading {url}: {message}")]
    Panicked {
        /// The URL being fetched when the panic happened.
        url: String,
        /// Panic payload, when it was a string.
        message: String,
    },
}

impl FetchError {
    /// Wraps any fetcher error (or a plain message).
    pub fn new(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Fetcher(error.into())
    }

    /// Creates the failure recorded for a contained fetcher panic.
    pub fn panicked(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Panicked {
            url: url.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }

    /// The fetcher's error as `E`, if that is what it returned.
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Fetcher(error) => error.downcast_ref::<E>(),
            Self::Panicked { .. } => None,
        }
    }
}
