//! Failure taxonomy for resolution and delivery.
//!
//! Every failure is caught at the boundary where it occurs and converted
//! into a terminal button state plus a wire-visible error string; nothing
//! here is ever allowed to escape into the host page.

use thiserror::Error;

/// Terminal outcome of a download request, as reported back to the page.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The user has disabled downloads; rejected before any resolution attempt.
    #[error("downloads are disabled in settings")]
    SettingsDisabled,

    /// Another request from the same page context is still in flight.
    /// Reported immediately, never queued.
    #[error("another download is already in flight")]
    AlreadyInFlight,

    /// No strategy produced a usable candidate URL.
    #[error("no downloadable video source found")]
    NoSource,

    /// Every rung of the local delivery ladder failed. Carries the last
    /// rung's error so the user-visible message names the final cause.
    #[error("all download attempts failed: {last}")]
    Exhausted { last: String },

    /// The native helper channel could not be used.
    #[error("native helper: {0}")]
    Transport(#[from] TransportError),
}

/// Errors from the native-messaging channel to the helper process.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No helper command is configured for relay mode.
    #[error("no native helper configured")]
    NotConfigured,

    /// The helper process could not be started.
    #[error("failed to start helper: {0}")]
    Spawn(std::io::Error),

    /// The channel closed; a request outstanding at that moment fails
    /// with this rather than hanging.
    #[error("helper disconnected")]
    Disconnected,

    /// A frame could not be read or written.
    #[error("frame codec: {0}")]
    Codec(String),
}

/// Error from one attempt of a [`crate::deliver::DownloadSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),

    /// Network-level failure (DNS, reset, timeout).
    #[error("network: {0}")]
    Network(String),

    /// The sink refused or could not store the file.
    #[error("{0}")]
    Rejected(String),
}
