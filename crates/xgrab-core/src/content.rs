//! Page-side runtime: scans for videos, injects download controls, and
//! drives them through activation, completion, and revert.
//!
//! Everything here runs on one task; [`crate::page::Page`] holds `Rc`
//! handlers and is not `Send`.

use crate::bridge::{PageNotice, PagePort, PageRequest};
use crate::button::{glyph, ButtonRegistry, ButtonState, InjectedButton, BUTTON_CLASS};
use crate::error::DeliveryError;
use crate::locate::{self, ViewKind, PROCESSED_ATTR};
use crate::page::{NodeId, Page};
use crate::resolve::{self, SessionFlags};
use crate::settings::Settings;
use crate::watch::{ChangeStream, QUIET_WINDOW};
use tokio::time::Instant;

pub struct PageRuntime {
    pub page: Page,
    view: ViewKind,
    buttons: ButtonRegistry,
    port: PagePort,
    enabled: bool,
    flags: SessionFlags,
}

impl PageRuntime {
    pub fn new(page: Page, view: ViewKind, port: PagePort, settings: Settings) -> Self {
        Self {
            page,
            view,
            buttons: ButtonRegistry::default(),
            port,
            enabled: settings.enabled,
            flags: SessionFlags::default(),
        }
    }

    /// Settings pushes take effect on the next activation.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.enabled = settings.enabled;
    }

    pub fn button_state(&self, control: NodeId) -> Option<ButtonState> {
        self.buttons.state_of(control)
    }

    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }

    /// One idempotent scan pass: finds unprocessed videos, resolves their
    /// containers, and injects a control into each container's toolbar.
    /// Returns the nodes of newly injected controls.
    pub fn scan(&mut self) -> Vec<NodeId> {
        let videos = self
            .page
            .find_all(self.page.root(), |p, n| p.tag(n) == "video");
        let mut injected = Vec::new();

        for video in videos {
            let Some(container) = locate::container_for(&self.page, video, self.view) else {
                continue;
            };
            if self.page.has_attr(container, PROCESSED_ATTR) {
                continue;
            }
            // Marked before toolbar resolution, so a post whose toolbar
            // cannot be found is still never scanned twice.
            self.page.set_attr(container, PROCESSED_ATTR, "true");

            let host = locate::toolbar_for(&self.page, container).unwrap_or(container);
            let control = self.page.append(host, "div");
            self.page.set_attr(control, "class", BUTTON_CLASS);

            let button = InjectedButton::new(control, container);
            button.render(&mut self.page);
            self.buttons.insert(button);
            injected.push(control);
        }

        if !injected.is_empty() {
            tracing::debug!(count = injected.len(), "injected download controls");
        }
        injected
    }

    /// Full activation flow for one control: state to Loading, resolve
    /// candidates, request delivery, reflect the outcome. Returns the
    /// resulting state, or `None` for an unknown control.
    pub async fn activate(&mut self, control: NodeId) -> Option<ButtonState> {
        let (armed, container) = {
            let button = self.buttons.by_node(control)?;
            (button.begin(), button.container)
        };
        if !armed {
            // Re-entrant click while loading or terminal; ignored.
            return self.buttons.state_of(control);
        }
        self.render(control);

        // Checked before any resolution work, per the master switch.
        if !self.enabled {
            tracing::debug!("downloads disabled, rejecting activation");
            return Some(self.settle(control, false));
        }

        let candidates = resolve::resolve_candidates(&mut self.page, container, &mut self.flags).await;
        let Some(best) = resolve::best(&candidates) else {
            tracing::warn!("activation failed: {}", DeliveryError::NoSource);
            return Some(self.settle(control, false));
        };
        let url = best.url.clone();

        let reply = self
            .port
            .request(PageRequest::DownloadVideo { url })
            .await;
        if !reply.success {
            tracing::warn!(error = ?reply.error, "delivery rejected");
        }
        let state = self.settle(control, reply.success);

        if reply.success && self.flags.reload_after_download {
            self.flags.reload_after_download = false;
            self.page.request_reload();
        }
        Some(state)
    }

    /// Routes an asynchronous completion notice to the loading control.
    /// With no control loading the notice is dropped silently.
    pub fn route_notice(&mut self, notice: &PageNotice) -> bool {
        let ok = matches!(notice, PageNotice::Complete { .. });
        let Some(button) = self.buttons.loading_mut() else {
            tracing::debug!("no loading control, dropping completion notice");
            return false;
        };
        let control = button.node;
        button.finish(ok);
        self.render(control);
        true
    }

    /// Reverts every expired terminal control back to Idle and re-renders.
    pub fn flush_reverts(&mut self) {
        for control in self.buttons.flush_reverts(Instant::now()) {
            self.render(control);
        }
    }

    /// Earliest pending revert deadline, for callers scheduling flushes.
    pub fn next_revert_at(&self) -> Option<Instant> {
        self.buttons.next_revert_at()
    }

    /// Scans after every quiet window until the change stream closes.
    pub async fn run_scans(&mut self, changes: &mut ChangeStream) {
        while changes.next_scan(QUIET_WINDOW).await.is_some() {
            self.scan();
        }
    }

    fn render(&mut self, control: NodeId) {
        if let Some(state) = self.buttons.state_of(control) {
            self.page.set_text(control, glyph(state));
        }
    }

    fn settle(&mut self, control: NodeId, ok: bool) -> ButtonState {
        if let Some(button) = self.buttons.by_node(control) {
            button.finish(ok);
        }
        self.render(control);
        self.buttons
            .state_of(control)
            .unwrap_or(ButtonState::Idle)
    }
}
