//! Download backend abstraction and the libcurl-backed implementation.

use crate::error::SinkError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);

/// The backend the orchestrator delivers through. One implementation
/// fronts the real HTTP stack; tests swap in scripted fakes.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Hands `url` to the backend to be saved as `filename`. `url` may be
    /// a staged payload handle from [`serve_payload`](Self::serve_payload).
    /// Returns the backend's download id.
    async fn begin(&self, url: &str, filename: &str, save_as: bool) -> Result<u32, SinkError>;

    /// Fetches the body directly, for the re-serve rung.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SinkError>;

    /// Stages fetched bytes so [`begin`](Self::begin) can deliver them
    /// without touching the network again. Returns the payload handle.
    async fn serve_payload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, SinkError>;

    /// Releases a staged payload. Missing handles are ignored.
    async fn revoke_payload(&self, handle: &str);
}

/// Sink backed by libcurl, saving into a downloads directory and staging
/// re-served payloads in a scratch directory.
pub struct HttpSink {
    downloads_dir: PathBuf,
    staging_dir: PathBuf,
    next_id: AtomicU32,
}

impl HttpSink {
    pub fn new(downloads_dir: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
            staging_dir: staging_dir.into(),
            next_id: AtomicU32::new(0),
        }
    }

    fn allocate_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn rejected(err: impl std::fmt::Display) -> SinkError {
    SinkError::Rejected(err.to_string())
}

/// Staged payload handles are plain paths; everything else is a URL.
fn is_payload_handle(url: &str) -> bool {
    !url.contains("://")
}

async fn fetch_body(url: &str) -> Result<Vec<u8>, SinkError> {
    let url = url.to_string();
    tokio::task::spawn_blocking(move || fetch_blocking(&url))
        .await
        .map_err(|_| SinkError::Rejected("fetch worker panicked".to_string()))?
}

fn fetch_blocking(url: &str) -> Result<Vec<u8>, SinkError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.connect_timeout(CONNECT_TIMEOUT).map_err(curl_err)?;
    easy.timeout(TRANSFER_TIMEOUT).map_err(curl_err)?;

    let mut headers = curl::easy::List::new();
    headers
        .append("Accept: video/mp4,video/*;q=0.9,*/*;q=0.8")
        .map_err(curl_err)?;
    easy.http_headers(headers).map_err(curl_err)?;

    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|chunk| {
                body.extend_from_slice(chunk);
                Ok(chunk.len())
            })
            .map_err(curl_err)?;
        transfer
            .perform()
            .map_err(|e| SinkError::Network(e.to_string()))?;
    }

    let code = easy.response_code().map_err(curl_err)?;
    if !(200..300).contains(&code) {
        return Err(SinkError::Http(code));
    }
    Ok(body)
}

fn curl_err(err: curl::Error) -> SinkError {
    SinkError::Network(err.to_string())
}

#[async_trait]
impl DownloadSink for HttpSink {
    async fn begin(&self, url: &str, filename: &str, save_as: bool) -> Result<u32, SinkError> {
        if save_as {
            // No interactive prompt on this backend; save directly.
            tracing::debug!("save-as requested but unsupported here, saving directly");
        }
        tokio::fs::create_dir_all(&self.downloads_dir)
            .await
            .map_err(rejected)?;
        let dest = self.downloads_dir.join(filename);

        if is_payload_handle(url) {
            tokio::fs::copy(Path::new(url), &dest)
                .await
                .map_err(rejected)?;
        } else {
            let body = fetch_body(url).await?;
            tokio::fs::write(&dest, &body).await.map_err(rejected)?;
        }

        let id = self.allocate_id();
        tracing::info!(id, dest = %dest.display(), "download saved");
        Ok(id)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SinkError> {
        fetch_body(url).await
    }

    async fn serve_payload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, SinkError> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(rejected)?;
        let handle = self
            .staging_dir
            .join(format!("{}-{}", uuid::Uuid::new_v4().simple(), filename));
        tokio::fs::write(&handle, &bytes).await.map_err(rejected)?;
        Ok(handle.to_string_lossy().into_owned())
    }

    async fn revoke_payload(&self, handle: &str) {
        if let Err(err) = tokio::fs::remove_file(handle).await {
            tracing::debug!(handle, "payload already gone: {err}");
        }
    }
}
