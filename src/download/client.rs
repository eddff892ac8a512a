//! HTTP client wrapper for fetching URLs to local files.
//!
//! This module provides the `HttpClient` struct which handles streaming
//! downloads with proper timeout configuration and error handling. It is the
//! production [`Fetcher`] used by the download queue.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::RETRY_AFTER;
use reqwest::{Body, Client, Method, Response};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::queue::{FetchError, Fetcher};
use crate::user_agent;

/// HTTP client for fetching URLs with streaming support.
///
/// This client is designed to be created once and reused for multiple downloads,
/// taking advantage of connection pooling. Cloning is cheap.
///
/// # Example
///
/// ```no_run
/// use fetchq_core::download::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let bytes = client
///     .download_to("https://example.com/file.pdf", Path::new("./downloads/file.pdf"))
///     .await?;
/// println!("Downloaded {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large files)
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        Self::try_new_with_timeouts(connect_timeout_secs, read_timeout_secs)
            .expect("failed to build HTTP client with static configuration")
    }

    /// Fallible variant of [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error.
    pub fn try_new() -> Result<Self, reqwest::Error> {
        Self::try_new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Fallible variant of [`new_with_timeouts`](Self::new_with_timeouts).
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error (for example when the TLS backend
    /// cannot be initialized).
    pub fn try_new_with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// Downloads `url` with a GET into the file at `destination`, returning
    /// bytes written. See [`download_with`](Self::download_with).
    ///
    /// # Errors
    ///
    /// Same as [`download_with`](Self::download_with).
    pub async fn download_to(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        self.download_with(Method::GET, url, None, destination).await
    }

    /// Sends `method` to `url` with an optional `body` and streams the
    /// response into the file at `destination`, returning bytes written.
    ///
    /// The destination's parent directory is created if missing. An existing
    /// file at `destination` is truncated. On a streaming failure the partial
    /// file is removed.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - Creating the directory or writing the file fails
    #[instrument(
        skip_all,
        fields(method = %method, url = %url, destination = %destination.display())
    )]
    pub async fn download_with(
        &self,
        method: Method,
        url: &str,
        body: Option<Body>,
        destination: &Path,
    ) -> Result<u64, DownloadError> {
        debug!("starting download");

        let response = self.request(method, url, body).await?;

        if let Some(parent) = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let mut file = File::create(destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;

        let stream_result = stream_to_file(&mut file, response, url, destination).await;
        if stream_result.is_err() {
            debug!(path = %destination.display(), "cleaning up partial file after error");
            drop(file);
            let _ = tokio::fs::remove_file(destination).await;
        }
        let bytes = stream_result?;

        info!(path = %destination.display(), bytes, "download complete");
        Ok(bytes)
    }

    /// Fetches `url` and returns the response body as text.
    ///
    /// # Errors
    ///
    /// Returns the same request errors as [`download_to`](Self::download_to);
    /// a body that cannot be read is reported as [`DownloadError::Network`].
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        let response = self.request(Method::GET, url, None).await?;
        response
            .text()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))
    }

    /// Sends `method` to `url` with an optional `body` and returns the
    /// response once its status is known to be a success.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for an unparsable URL,
    /// [`DownloadError::Network`] or [`DownloadError::Timeout`] when the
    /// request fails, and [`DownloadError::HttpStatus`] for a non-2xx answer.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Body>,
    ) -> Result<Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let mut request = self.client.request(method, parsed);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            return Err(DownloadError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        self.download_to(url, destination)
            .await
            .map(|_| ())
            .map_err(FetchError::from)
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
