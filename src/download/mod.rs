//! HTTP fetcher for streaming URLs to local files.
//!
//! This is the production [`Fetcher`](crate::queue::Fetcher) collaborator of
//! the download queue: one GET per job, body streamed to the destination path.
//! Other methods and request bodies go through
//! [`HttpClient::download_with`] and [`HttpClient::request`].
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Parent directory of the destination created on demand
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use fetchq_core::download::HttpClient;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! client
//!     .download_to("https://example.com/paper.pdf", Path::new("./downloads/paper.pdf"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;

pub use client::HttpClient;
pub use error::{DownloadError, FailureKind};
pub use reqwest::{Body, Method};
