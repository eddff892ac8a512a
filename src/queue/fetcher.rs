//! The single capability the queue needs from the outside world.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::FetchError;

/// Fetches one URL into one destination.
///
/// A call is one atomic attempt: the queue never retries it and never looks
/// inside the returned error. Implementations wrap their own error type with
/// [`FetchError::new`] and may impose their own deadline.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Performs the fetch of `url` into `destination`.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        (**self).fetch(url, destination).await
    }
}
