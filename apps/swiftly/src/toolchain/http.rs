//! HTTP access for the catalog and archive downloads.
//!
//! The transport is abstracted behind [`HttpExecutor`] so the install state
//! machine can run against an in-memory server in tests. [`HttpClient`] sits
//! on top and turns transport results into the typed catalog and download
//! errors.

use crate::errors::SwiftlyError;
use crate::toolchain::download::ProgressCallback;
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Performs HTTP GET requests.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Fetches `url` into memory.
    ///
    /// Non-2xx statuses are returned as responses; only transport failures
    /// are errors.
    async fn get(&self, url: &str) -> Result<HttpResponse>;

    /// Streams `url` into `dest` and returns the HTTP status.
    ///
    /// Nothing is written to `dest` unless the status is 2xx.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<u16>;
}

/// Client used by the catalog and installer.
#[derive(Clone)]
pub struct HttpClient {
    executor: Arc<dyn HttpExecutor>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(executor: Arc<dyn HttpExecutor>) -> Self {
        Self { executor }
    }

    /// Fetches and decodes a JSON document.
    ///
    /// # Errors
    ///
    /// - `CatalogUnavailable` on transport failure or a non-2xx status (with
    ///   the status and body)
    /// - `CatalogMalformed` if the body does not decode as `T`
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        log::debug!("GET {url}");
        let response = self
            .executor
            .get(url)
            .await
            .map_err(|e| SwiftlyError::catalog_unavailable(url, None, format!("{e:#}")))?;

        if !response.is_success() {
            let body = String::from_utf8_lossy(&response.body).trim().to_string();
            return Err(
                SwiftlyError::catalog_unavailable(url, Some(response.status), body).into(),
            );
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| SwiftlyError::catalog_malformed(url, e.to_string()).into())
    }

    /// Downloads `url` to `dest`.
    ///
    /// # Errors
    ///
    /// - `DownloadNotFound` on 404
    /// - `DownloadFailed` on transport failure or any other non-2xx status
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        log::debug!("downloading {url} to {}", dest.display());
        let status = self
            .executor
            .download(url, dest, progress)
            .await
            .map_err(|e| SwiftlyError::download_failed(url, format!("{e:#}")))?;

        match status {
            200..=299 => Ok(()),
            404 => Err(SwiftlyError::download_not_found(url).into()),
            code => Err(SwiftlyError::download_failed(url, format!("HTTP {code}")).into()),
        }
    }
}
