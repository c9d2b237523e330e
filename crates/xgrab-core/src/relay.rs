//! Native helper relay: length-prefixed JSON frames over the helper
//! process's stdio.
//!
//! Frame layout is a u32 little-endian byte length followed by exactly
//! that many bytes of JSON. Frames above [`MAX_FRAME`] bytes are refused
//! in both directions.

use crate::error::TransportError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};

/// Hard cap on a single frame, matching the native messaging limit.
pub const MAX_FRAME: u32 = 1024 * 1024;

/// Request sent to the helper: one URL per frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperRequest {
    pub url: String,
}

/// Reply frame from the helper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperReply {
    pub success: bool,
    pub title: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl HelperReply {
    pub fn done(title: Option<String>, filename: Option<String>) -> Self {
        Self {
            success: true,
            title,
            filename,
            error: None,
        }
    }

    pub fn failure(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            title: None,
            filename: None,
            error: Some(error.to_string()),
        }
    }
}

fn stream_gone(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}

fn map_io(err: io::Error) -> TransportError {
    if stream_gone(&err) {
        TransportError::Disconnected
    } else {
        TransportError::Codec(err.to_string())
    }
}

/// Writes one length-prefixed JSON frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message).map_err(|e| TransportError::Codec(e.to_string()))?;
    if body.len() > MAX_FRAME as usize {
        return Err(TransportError::Codec(format!(
            "frame of {} bytes exceeds the {} byte limit",
            body.len(),
            MAX_FRAME
        )));
    }
    writer.write_u32_le(body.len() as u32).await.map_err(map_io)?;
    writer.write_all(&body).await.map_err(map_io)?;
    writer.flush().await.map_err(map_io)?;
    Ok(())
}

/// Reads one length-prefixed JSON frame. EOF on the length prefix means
/// the peer went away.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, TransportError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = reader.read_u32_le().await.map_err(map_io)?;
    if len > MAX_FRAME {
        return Err(TransportError::Codec(format!(
            "peer announced a {len} byte frame, limit is {MAX_FRAME}"
        )));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await.map_err(map_io)?;
    serde_json::from_slice(&body).map_err(|e| TransportError::Codec(e.to_string()))
}

/// One live connection to a helper process (or, in tests, any stream pair).
pub struct RelayChannel {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    child: Option<Child>,
}

impl RelayChannel {
    /// Wraps an arbitrary stream pair. Used by tests and embedders that
    /// manage the helper lifecycle themselves.
    pub fn from_io(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            child: None,
        }
    }

    /// Spawns the helper binary and connects to its stdio.
    pub fn spawn(helper: &Path) -> Result<Self, TransportError> {
        let mut child = Command::new(helper)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(TransportError::Spawn)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn(io::Error::other("helper stdin not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn(io::Error::other("helper stdout not captured")))?;
        Ok(Self {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }

    /// One request/reply round trip. The helper answers frames in order,
    /// one reply per request.
    pub async fn request(&mut self, url: &str) -> Result<HelperReply, TransportError> {
        write_frame(
            &mut self.writer,
            &HelperRequest {
                url: url.to_string(),
            },
        )
        .await?;
        read_frame(&mut self.reader).await
    }
}

impl Drop for RelayChannel {
    fn drop(&mut self) {
        if let Some(child) = &mut self.child {
            // kill_on_drop handles the process; this just logs the teardown.
            tracing::debug!(pid = ?child.id(), "relay helper released");
        }
    }
}

/// Lazily connected handle to the helper. The channel is established on
/// the first request and torn down whenever a transport error surfaces,
/// so the next request reconnects from scratch.
pub struct RelayLink {
    helper: Option<PathBuf>,
    channel: Option<RelayChannel>,
}

impl RelayLink {
    pub fn new(helper: Option<PathBuf>) -> Self {
        Self {
            helper,
            channel: None,
        }
    }

    /// Pre-connected link for tests.
    pub fn with_channel(channel: RelayChannel) -> Self {
        Self {
            helper: None,
            channel: Some(channel),
        }
    }

    pub async fn request(&mut self, url: &str) -> Result<HelperReply, TransportError> {
        if self.channel.is_none() {
            let helper = self.helper.as_deref().ok_or(TransportError::NotConfigured)?;
            tracing::info!(helper = %helper.display(), "connecting relay helper");
            self.channel = Some(RelayChannel::spawn(helper)?);
        }
        let Some(channel) = self.channel.as_mut() else {
            return Err(TransportError::NotConfigured);
        };
        match channel.request(url).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                // The stream is in an unknown state; drop it so the next
                // request reconnects.
                tracing::warn!("relay transport failed, tearing down: {err}");
                self.channel = None;
                Err(err)
            }
        }
    }
}
