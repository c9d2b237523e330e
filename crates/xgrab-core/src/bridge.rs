//! Typed request/response protocol between page contexts and the
//! orchestrator.
//!
//! Each page context gets its own [`PagePort`]; the orchestrator owns the
//! single [`OrchestratorPort`]. Replies travel over per-request oneshot
//! channels so a response can be delivered long after the originating call
//! returned, and completion notices travel over per-context channels so
//! they can be routed to the one control in Loading state.

use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

/// Identifies one requesting page context (tab).
pub type ContextId = u32;

/// Requests a page context may send. Wire names match the original
/// extension protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PageRequest {
    /// Resolve-and-download round trip for an already resolved URL.
    DownloadVideo { url: String },
    /// Download with explicit filename/save-as overrides.
    #[serde(rename_all = "camelCase")]
    StartDownload {
        url: String,
        #[serde(default)]
        filename: Option<String>,
        #[serde(default)]
        save_as: Option<bool>,
    },
    /// Fire-and-forget settings push from the settings UI.
    SettingsUpdated { settings: Settings },
    /// The user used the page's own share-menu download link; count it.
    IncrementDownloadCount,
}

/// Terminal response to a download request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadReply {
    pub fn ok(download_id: Option<u32>) -> Self {
        Self {
            success: true,
            download_id,
            error: None,
        }
    }

    pub fn fail(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            download_id: None,
            error: Some(error.to_string()),
        }
    }
}

/// Asynchronous notification pushed from the orchestrator to a page
/// context, routed to its loading control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PageNotice {
    #[serde(rename = "DOWNLOAD_COMPLETE", rename_all = "camelCase")]
    Complete {
        url: String,
        download_id: Option<u32>,
    },
    #[serde(rename = "DOWNLOAD_FAILED", rename_all = "camelCase")]
    Failed { url: String, error: String },
}

/// One request in flight over the bridge.
pub struct Envelope {
    pub ctx: ContextId,
    pub request: PageRequest,
    /// Absent for fire-and-forget requests.
    pub reply: Option<oneshot::Sender<DownloadReply>>,
}

type NoticeMap = Arc<Mutex<HashMap<ContextId, mpsc::UnboundedSender<PageNotice>>>>;

/// Connects any number of page contexts to one orchestrator.
pub struct Bridge {
    req_tx: mpsc::UnboundedSender<Envelope>,
    req_rx: Option<mpsc::UnboundedReceiver<Envelope>>,
    notices: NoticeMap,
    next_ctx: ContextId,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        Self {
            req_tx,
            req_rx: Some(req_rx),
            notices: Arc::new(Mutex::new(HashMap::new())),
            next_ctx: 0,
        }
    }

    /// Registers a new page context and returns its port.
    pub fn attach_page(&mut self) -> PagePort {
        let ctx = self.next_ctx;
        self.next_ctx += 1;
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        self.notices.lock().unwrap().insert(ctx, notice_tx);
        PagePort {
            ctx,
            req_tx: self.req_tx.clone(),
            notice_rx,
        }
    }

    /// The orchestrator's end. There is exactly one; subsequent calls
    /// return `None`.
    pub fn orchestrator_port(&mut self) -> Option<OrchestratorPort> {
        Some(OrchestratorPort {
            req_rx: self.req_rx.take()?,
            notices: Arc::clone(&self.notices),
        })
    }
}

/// Page-context end of the bridge.
pub struct PagePort {
    ctx: ContextId,
    req_tx: mpsc::UnboundedSender<Envelope>,
    notice_rx: mpsc::UnboundedReceiver<PageNotice>,
}

impl PagePort {
    pub fn context(&self) -> ContextId {
        self.ctx
    }

    /// Sends a request and waits for its terminal reply. Transport loss
    /// is reported in the same shape as any other failure.
    pub async fn request(&self, request: PageRequest) -> DownloadReply {
        let (tx, rx) = oneshot::channel();
        let envelope = Envelope {
            ctx: self.ctx,
            request,
            reply: Some(tx),
        };
        if self.req_tx.send(envelope).is_err() {
            return DownloadReply::fail("background context unavailable");
        }
        rx.await
            .unwrap_or_else(|_| DownloadReply::fail("background context dropped the request"))
    }

    /// Fire-and-forget send (settings pushes, counter bumps).
    pub fn send(&self, request: PageRequest) {
        let _ = self.req_tx.send(Envelope {
            ctx: self.ctx,
            request,
            reply: None,
        });
    }

    pub async fn next_notice(&mut self) -> Option<PageNotice> {
        self.notice_rx.recv().await
    }

    pub fn try_notice(&mut self) -> Option<PageNotice> {
        self.notice_rx.try_recv().ok()
    }
}

/// Orchestrator end of the bridge.
pub struct OrchestratorPort {
    req_rx: mpsc::UnboundedReceiver<Envelope>,
    notices: NoticeMap,
}

impl OrchestratorPort {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.req_rx.recv().await
    }

    /// Handle for pushing notices to one context from spawned tasks.
    pub fn notifier(&self, ctx: ContextId) -> Notifier {
        Notifier {
            ctx,
            notices: Arc::clone(&self.notices),
        }
    }
}

/// Cheap clonable handle delivering notices to one page context.
#[derive(Clone)]
pub struct Notifier {
    ctx: ContextId,
    notices: NoticeMap,
}

impl Notifier {
    /// Delivers a notice; a vanished page context is not an error.
    pub fn notify(&self, notice: PageNotice) {
        if let Some(tx) = self.notices.lock().unwrap().get(&self.ctx) {
            let _ = tx.send(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape_matches_protocol() {
        let req = PageRequest::DownloadVideo {
            url: "https://video.twimg.com/v/a.mp4".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"kind": "downloadVideo", "url": "https://video.twimg.com/v/a.mp4"})
        );

        let req = PageRequest::StartDownload {
            url: "u".to_string(),
            filename: Some("f.mp4".to_string()),
            save_as: Some(true),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["kind"], "startDownload");
        assert_eq!(value["saveAs"], json!(true));
    }

    #[test]
    fn notice_wire_shape_matches_protocol() {
        let notice = PageNotice::Failed {
            url: "u".to_string(),
            error: "nope".to_string(),
        };
        let value = serde_json::to_value(&notice).unwrap();
        assert_eq!(value["type"], "DOWNLOAD_FAILED");
        assert_eq!(value["data"]["error"], "nope");
    }

    #[tokio::test]
    async fn reply_is_deliverable_after_the_call_returns() {
        let mut bridge = Bridge::new();
        let page = bridge.attach_page();
        let mut port = bridge.orchestrator_port().unwrap();

        let server = tokio::spawn(async move {
            let envelope = port.recv().await.unwrap();
            // Hold the channel open across an await point before answering.
            tokio::task::yield_now().await;
            if let Some(reply) = envelope.reply {
                reply.send(DownloadReply::ok(Some(3))).unwrap();
            }
        });

        let reply = page
            .request(PageRequest::DownloadVideo {
                url: "u".to_string(),
            })
            .await;
        assert!(reply.success);
        assert_eq!(reply.download_id, Some(3));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn notices_are_per_context() {
        let mut bridge = Bridge::new();
        let mut page_a = bridge.attach_page();
        let mut page_b = bridge.attach_page();
        let port = bridge.orchestrator_port().unwrap();

        port.notifier(page_b.context()).notify(PageNotice::Complete {
            url: "u".to_string(),
            download_id: None,
        });

        assert!(page_a.try_notice().is_none());
        assert!(matches!(
            page_b.next_notice().await,
            Some(PageNotice::Complete { .. })
        ));
    }
}
