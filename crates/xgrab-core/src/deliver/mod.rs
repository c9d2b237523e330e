//! Download orchestrator: owns the sink, the flight slots and the relay
//! link, serves bridge requests, and runs the local delivery ladder.
//!
//! The ladder tries, in order: the URL as resolved, the normalized CDN
//! URL (query stripped), then fetch-and-re-serve through a staged
//! payload. It halts at the first rung that succeeds; when every rung
//! fails the aggregate error names the last rung's failure. Staged
//! payloads are revoked on a fixed timer whether or not the sink is
//! still reading them.

mod filename;
mod normalize;
mod sink;
mod slot;

pub use filename::{derive_filename, today};
pub use normalize::normalize_cdn_url;
pub use sink::{DownloadSink, HttpSink};
pub use slot::{FlightGuard, FlightSlots};

use crate::bridge::{
    ContextId, DownloadReply, Envelope, Notifier, OrchestratorPort, PageNotice, PageRequest,
};
use crate::error::DeliveryError;
use crate::relay::RelayLink;
use crate::settings::{Settings, SettingsStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

/// How long a staged payload stays live before it is revoked.
pub const PAYLOAD_TTL: Duration = Duration::from_secs(60);

/// Where downloads are carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// The sink fetches and saves directly.
    Local,
    /// Requests are forwarded to the native helper.
    Relay,
}

pub struct Orchestrator<S> {
    sink: Arc<S>,
    store: Arc<dyn SettingsStore>,
    settings: Settings,
    mode: DeliveryMode,
    relay: Arc<Mutex<RelayLink>>,
    slots: FlightSlots,
}

impl<S: DownloadSink + 'static> Orchestrator<S> {
    pub fn new(
        sink: S,
        store: Arc<dyn SettingsStore>,
        mode: DeliveryMode,
        relay: RelayLink,
    ) -> anyhow::Result<Self> {
        let settings = store.load()?;
        Ok(Self {
            sink: Arc::new(sink),
            store,
            settings,
            mode,
            relay: Arc::new(Mutex::new(relay)),
            slots: FlightSlots::new(),
        })
    }

    /// Serves bridge requests until every page port is gone. Deliveries
    /// run on spawned tasks so conflicting requests can still be rejected
    /// while one is in flight.
    pub async fn serve(mut self, mut port: OrchestratorPort) {
        while let Some(envelope) = port.recv().await {
            self.handle(envelope, &port);
        }
    }

    fn handle(&mut self, envelope: Envelope, port: &OrchestratorPort) {
        let Envelope {
            ctx,
            request,
            reply,
        } = envelope;
        match request {
            PageRequest::SettingsUpdated { settings } => {
                tracing::debug!(enabled = settings.enabled, "settings updated");
                self.settings = settings;
            }
            PageRequest::IncrementDownloadCount => {
                if let Err(err) = self.store.increment_download_count() {
                    tracing::warn!("download counter update failed: {err:#}");
                }
            }
            PageRequest::DownloadVideo { url } => {
                self.dispatch(ctx, url, None, None, reply, port);
            }
            PageRequest::StartDownload {
                url,
                filename,
                save_as,
            } => {
                self.dispatch(ctx, url, filename, save_as, reply, port);
            }
        }
    }

    fn dispatch(
        &self,
        ctx: ContextId,
        url: String,
        filename: Option<String>,
        save_as: Option<bool>,
        reply: Option<oneshot::Sender<DownloadReply>>,
        port: &OrchestratorPort,
    ) {
        let notifier = port.notifier(ctx);

        // Rejected before any resolution or network activity.
        if !self.settings.enabled {
            fail(reply, notifier, url, &DeliveryError::SettingsDisabled);
            return;
        }

        // One delivery per context; conflicts are rejected, never queued.
        let Some(guard) = self.slots.try_acquire(ctx) else {
            fail(reply, notifier, url, &DeliveryError::AlreadyInFlight);
            return;
        };

        let filename = filename.unwrap_or_else(|| derive_filename(&url, today()));
        let save_as = save_as.unwrap_or(self.settings.save_as);
        let sink = Arc::clone(&self.sink);
        let store = Arc::clone(&self.store);
        let relay = Arc::clone(&self.relay);
        let mode = self.mode;

        tokio::spawn(async move {
            // Holds the flight slot until this task finishes, on every path.
            let _guard = guard;
            let result = match mode {
                DeliveryMode::Local => deliver_local(sink, &url, &filename, save_as).await,
                DeliveryMode::Relay => deliver_relay(&relay, &url).await,
            };
            match result {
                Ok(download_id) => {
                    if let Err(err) = store.increment_download_count() {
                        tracing::warn!("download counter update failed: {err:#}");
                    }
                    respond(reply, DownloadReply::ok(download_id));
                    notifier.notify(PageNotice::Complete { url, download_id });
                }
                Err(err) => {
                    tracing::warn!(%url, "delivery failed: {err}");
                    fail(reply, notifier, url, &err);
                }
            }
        });
    }
}

fn respond(reply: Option<oneshot::Sender<DownloadReply>>, message: DownloadReply) {
    if let Some(tx) = reply {
        // The page context may already be gone.
        let _ = tx.send(message);
    }
}

fn fail(
    reply: Option<oneshot::Sender<DownloadReply>>,
    notifier: Notifier,
    url: String,
    err: &DeliveryError,
) {
    respond(reply, DownloadReply::fail(err));
    notifier.notify(PageNotice::Failed {
        url,
        error: err.to_string(),
    });
}

/// Runs the local ladder against the sink.
pub async fn deliver_local<S>(
    sink: Arc<S>,
    url: &str,
    filename: &str,
    save_as: bool,
) -> Result<Option<u32>, DeliveryError>
where
    S: DownloadSink + ?Sized + 'static,
{
    // Rung 1: the URL exactly as resolved.
    let direct_err = match sink.begin(url, filename, save_as).await {
        Ok(id) => return Ok(Some(id)),
        Err(err) => err,
    };
    tracing::debug!(%url, "direct delivery failed ({direct_err}), trying normalized URL");

    // Rung 2: normalized CDN URL, skipped when normalization is a no-op.
    let normalized = normalize_cdn_url(url);
    if normalized != url {
        match sink.begin(&normalized, filename, save_as).await {
            Ok(id) => return Ok(Some(id)),
            Err(err) => {
                tracing::debug!("normalized delivery failed ({err}), fetching directly");
            }
        }
    }

    // Rung 3: fetch the body ourselves and re-serve it to the sink
    // through a staged payload.
    let bytes = sink
        .fetch(url)
        .await
        .map_err(|err| DeliveryError::Exhausted {
            last: err.to_string(),
        })?;
    let handle = sink
        .serve_payload(filename, bytes)
        .await
        .map_err(|err| DeliveryError::Exhausted {
            last: err.to_string(),
        })?;
    schedule_revoke(Arc::clone(&sink), handle.clone());
    match sink.begin(&handle, filename, save_as).await {
        Ok(id) => Ok(Some(id)),
        Err(err) => Err(DeliveryError::Exhausted {
            last: err.to_string(),
        }),
    }
}

/// Revokes a staged payload after [`PAYLOAD_TTL`], regardless of whether
/// the sink finished reading it.
fn schedule_revoke<S>(sink: Arc<S>, handle: String)
where
    S: DownloadSink + ?Sized + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(PAYLOAD_TTL).await;
        sink.revoke_payload(&handle).await;
    });
}

/// Relay mode: the helper owns fetching and saving; a helper-reported
/// failure carries the helper's error message.
async fn deliver_relay(
    relay: &Mutex<RelayLink>,
    url: &str,
) -> Result<Option<u32>, DeliveryError> {
    let mut link = relay.lock().await;
    let reply = link.request(url).await?;
    if reply.success {
        Ok(None)
    } else {
        Err(DeliveryError::Exhausted {
            last: reply
                .error
                .unwrap_or_else(|| "helper reported failure".to_string()),
        })
    }
}
