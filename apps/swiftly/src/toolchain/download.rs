//! Network transport backed by `reqwest`.
//!
//! Downloads are streamed to a `.part` file next to the destination and
//! renamed into place once the body has been fully written, so an interrupted
//! download never leaves a truncated archive under the final name. There are
//! no automatic retries; a failed download is resumed by running the command
//! again.
//!
//! Progress is reported through a [`ProgressCallback`] no more often than
//! every 250ms.

use crate::toolchain::http::{HttpExecutor, HttpResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

/// Progress event emitted during downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Download has started.
    Started {
        url: String,
        /// Total size in bytes, when the server sent `Content-Length`.
        total: Option<u64>,
    },
    /// Download progress update.
    Progress {
        /// Bytes downloaded so far.
        downloaded: u64,
        /// Average speed in bytes per second.
        speed: u64,
    },
    /// Download completed successfully.
    Completed,
    /// Download failed.
    Failed { error: String },
}

/// Callback receiving [`ProgressEvent`]s.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Minimum interval between progress callback invocations in milliseconds.
pub const PROGRESS_INTERVAL_MS: u128 = 250;

/// Timeout for catalog requests in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for a whole archive download in seconds.
const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

const USER_AGENT: &str = concat!("swiftly/", env!("CARGO_PKG_VERSION"));

/// [`HttpExecutor`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        let temp_path = dest.with_extension("part");
        let total = response.content_length();
        if let Some(callback) = progress {
            callback(ProgressEvent::Started {
                url: url.to_string(),
                total,
            });
        }

        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .with_context(|| format!("Failed to create file: {}", temp_path.display()))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let start_time = Instant::now();
        let mut last_update = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Failed to read chunk from {url}"))?;
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write to {}", temp_path.display()))?;
            downloaded += chunk.len() as u64;

            let now = Instant::now();
            if let Some(callback) = progress
                && now.duration_since(last_update).as_millis() >= PROGRESS_INTERVAL_MS
            {
                callback(ProgressEvent::Progress {
                    downloaded,
                    speed: average_speed(downloaded, start_time.elapsed()),
                });
                last_update = now;
            }
        }

        file.flush()
            .await
            .with_context(|| format!("Failed to flush {}", temp_path.display()))?;
        drop(file);

        tokio::fs::rename(&temp_path, dest).await.with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                dest.display()
            )
        })?;

        if let Some(callback) = progress {
            callback(ProgressEvent::Progress {
                downloaded,
                speed: average_speed(downloaded, start_time.elapsed()),
            });
            callback(ProgressEvent::Completed);
        }
        Ok(())
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response from {url}"))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .send()
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(status.as_u16());
        }

        if let Err(e) = self
            .stream_to_file(response, url, dest, progress.as_ref())
            .await
        {
            let _ = tokio::fs::remove_file(dest.with_extension("part")).await;
            if let Some(callback) = &progress {
                callback(ProgressEvent::Failed {
                    error: format!("{e:#}"),
                });
            }
            return Err(e);
        }
        Ok(status.as_u16())
    }
}

#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn average_speed(downloaded: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (downloaded as f64 / secs) as u64
    } else {
        0
    }
}

/// Formats bytes into a human-readable string (KB, MB, GB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Formats a speed in bytes per second.
#[must_use]
pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn format_speed_appends_rate() {
        assert_eq!(format_speed(2048), "2.00 KB/s");
    }

    #[test]
    fn average_speed_handles_zero_elapsed() {
        assert_eq!(average_speed(1000, Duration::ZERO), 0);
        assert_eq!(average_speed(1000, Duration::from_secs(2)), 500);
    }

    #[test]
    fn user_agent_names_the_tool() {
        assert!(USER_AGENT.starts_with("swiftly/"));
    }
}
