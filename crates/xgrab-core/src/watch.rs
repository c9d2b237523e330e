//! Mutation watcher: an event source with trailing-edge debounce.
//!
//! The host page reports "content changed" ticks through [`PageEvents`];
//! [`ChangeStream::next_scan`] collapses any burst of ticks into exactly
//! one scan trigger, fired once the quiet window has elapsed after the
//! *last* tick of the burst.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Quiet window between the last mutation of a burst and the scan it triggers.
pub const QUIET_WINDOW: Duration = Duration::from_millis(500);

/// Sender half handed to whatever observes the page.
#[derive(Clone)]
pub struct PageEvents {
    tx: mpsc::UnboundedSender<()>,
}

impl PageEvents {
    /// Reports one content mutation. Cheap, never blocks.
    pub fn content_changed(&self) {
        // A dropped stream just means no one scans anymore.
        let _ = self.tx.send(());
    }
}

/// Receiver half owned by the content runtime.
pub struct ChangeStream {
    rx: mpsc::UnboundedReceiver<()>,
}

impl ChangeStream {
    /// Waits for the next burst of mutations and resolves `window` after
    /// its last event (trailing edge). Returns `None` once all
    /// [`PageEvents`] handles are gone and every pending burst is flushed.
    pub async fn next_scan(&mut self, window: Duration) -> Option<()> {
        self.rx.recv().await?;
        loop {
            match timeout(window, self.rx.recv()).await {
                // Burst continues; the window restarts from this event.
                Ok(Some(())) => continue,
                // Senders gone; deliver the burst already started.
                Ok(None) => return Some(()),
                // Quiet window elapsed.
                Err(_) => return Some(()),
            }
        }
    }
}

/// Creates a connected watcher pair.
pub fn channel() -> (PageEvents, ChangeStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PageEvents { tx }, ChangeStream { rx })
}
