//! Crash-safe archive downloads.
//!
//! Bytes are streamed into `<destination>.tmp` and the temp file is renamed
//! over the destination only after the whole body has been written and
//! synced. A failed or interrupted transfer never leaves a half-written file
//! at the destination path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Response};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{PlugmanError, Result};

/// Suffix appended to the destination while a download is in flight.
pub const TEMP_SUFFIX: &str = ".tmp";

const FETCH_USER_AGENT: &str = concat!("plugman/", env!("CARGO_PKG_VERSION"));

/// Receives byte progress while a download streams.
///
/// Called inline from the download loop; implementations must be cheap.
pub trait DownloadProgress {
    /// Transfer started; `total` is the declared content length, if any.
    fn start(&mut self, _total: Option<u64>) {}

    /// `bytes` more bytes were written to disk.
    fn advance(&mut self, _bytes: u64) {}

    /// The body was fully received and written.
    fn finish(&mut self) {}

    /// The transfer was abandoned.
    fn abandon(&mut self) {}
}

/// Progress sink that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Path of the in-flight file for `dest`.
pub fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Streams URLs to disk with an atomic rename on success.
#[derive(Debug, Clone)]
pub struct FetchWriter {
    client: Client,
}

impl Default for FetchWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchWriter {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(FETCH_USER_AGENT)
            .connect_timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Download `url` to `dest`, returning the number of bytes written.
    ///
    /// On error the destination is left exactly as it was before the call.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut (dyn DownloadProgress + Send),
    ) -> Result<u64> {
        let failed = |reason: String| PlugmanError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        debug!(url = %url, dest = %dest.display(), "Starting download");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("status code {}", status.as_u16())));
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                failed(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let tmp = temp_path(dest);
        match stream_to_file(response, &tmp, progress).await {
            Ok(written) => {
                if let Err(e) = fs::rename(&tmp, dest).await {
                    let _ = fs::remove_file(&tmp).await;
                    return Err(failed(format!(
                        "cannot move download into place at {}: {}",
                        dest.display(),
                        e
                    )));
                }
                info!(url = %url, dest = %dest.display(), bytes = written, "Download complete");
                Ok(written)
            }
            Err(reason) => {
                progress.abandon();
                if let Err(e) = fs::remove_file(&tmp).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %tmp.display(), error = %e, "Failed to remove partial download");
                    }
                }
                Err(failed(reason))
            }
        }
    }
}

/// Copy the response body into `tmp`, checking it against `Content-Length`.
async fn stream_to_file(
    response: Response,
    tmp: &Path,
    progress: &mut (dyn DownloadProgress + Send),
) -> std::result::Result<u64, String> {
    let total = response.content_length();
    let mut file = fs::File::create(tmp)
        .await
        .map_err(|e| format!("cannot create {}: {}", tmp.display(), e))?;

    progress.start(total);
    let mut received: u64 = 0;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk
            .map_err(|e| format!("transfer interrupted after {} bytes: {}", received, e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("write to {} failed: {}", tmp.display(), e))?;
        received += chunk.len() as u64;
        progress.advance(chunk.len() as u64);
    }

    file.flush()
        .await
        .map_err(|e| format!("flush of {} failed: {}", tmp.display(), e))?;
    file.sync_all()
        .await
        .map_err(|e| format!("sync of {} failed: {}", tmp.display(), e))?;
    drop(file);

    if let Some(expected) = total {
        if received != expected {
            return Err(format!(
                "truncated body: received {} of {} bytes",
                received, expected
            ));
        }
    }

    progress.finish();
    Ok(received)
}
