//! fetchq core library
//!
//! Fetches sets of URLs to local files through a bounded pool of workers.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`queue`] - Job queue, worker pool, result ledger, and drain lifecycle
//! - [`download`] - HTTP fetcher that streams a URL to a destination file
//!
//! The queue only knows the [`Fetcher`] capability; [`HttpClient`] is the
//! production implementation, and tests plug in their own.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod queue;
mod user_agent;

// Re-export commonly used types
pub use download::{DownloadError, FailureKind, HttpClient};
pub use queue::{
    DEFAULT_WORKER_COUNT, DownloadQueue, FetchError, Fetcher, Job, JobResult, Outcome, QueueConfig,
    QueueError, QueueState, RecordingPolicy,
};
