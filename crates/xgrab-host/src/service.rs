//! Frame loop: one reply per request, in order, until the peer goes away.

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use xgrab_core::error::TransportError;
use xgrab_core::relay::{read_frame, write_frame, HelperReply, HelperRequest};

/// What the frame loop delegates each URL to. Implementations never
/// return transport errors; a failed download is a normal failure reply.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str) -> HelperReply;
}

/// Serves requests until the peer disconnects. A clean disconnect ends
/// the loop normally; anything else (a garbled frame, a dead stdout)
/// surfaces as an error so the process exits nonzero.
pub async fn serve<D, R, W>(downloader: &D, mut reader: R, mut writer: W) -> Result<()>
where
    D: Downloader + ?Sized,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!("helper started, waiting for requests");
    loop {
        let request: HelperRequest = match read_frame(&mut reader).await {
            Ok(request) => request,
            Err(TransportError::Disconnected) => {
                tracing::info!("peer disconnected, exiting");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(url = %request.url, "download requested");
        let reply = downloader.download(&request.url).await;
        if !reply.success {
            tracing::warn!(error = ?reply.error, "download failed");
        }
        write_frame(&mut writer, &reply).await?;
    }
}
