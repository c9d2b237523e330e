//! Per-post download control: an explicit state machine separate from its
//! rendering.
//!
//! `Idle -> Loading -> (Success | Error) -> Idle`. Activation disables
//! re-entrancy; terminal states auto-revert after a fixed delay. Rendering
//! is a pure projection of state onto a glyph, applied by the content
//! runtime, so the machine itself never touches the page.

use crate::page::{NodeId, Page};
use std::time::Duration;
use tokio::time::Instant;

/// Class attribute on injected controls.
pub const BUTTON_CLASS: &str = "x-download-button";

/// How long Success/Error stays visible before reverting to Idle.
pub const REVERT_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Idle,
    Loading,
    Success,
    Error,
}

/// Pure rendering projection of a state.
pub fn glyph(state: ButtonState) -> &'static str {
    match state {
        ButtonState::Idle => "\u{2913}",    // ⤓
        ButtonState::Loading => "\u{25cc}", // ◌
        ButtonState::Success => "\u{2713}", // ✓
        ButtonState::Error => "\u{2715}",   // ✕
    }
}

/// One injected control, bound to its page node and post container.
#[derive(Debug)]
pub struct InjectedButton {
    pub node: NodeId,
    pub container: NodeId,
    state: ButtonState,
    revert_at: Option<Instant>,
}

impl InjectedButton {
    pub fn new(node: NodeId, container: NodeId) -> Self {
        Self {
            node,
            container,
            state: ButtonState::Idle,
            revert_at: None,
        }
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// `Idle -> Loading`. Returns false (and does nothing) when the
    /// control is not idle, which is what disables re-entrant clicks.
    pub fn begin(&mut self) -> bool {
        if self.state != ButtonState::Idle {
            return false;
        }
        self.state = ButtonState::Loading;
        true
    }

    /// `Loading -> Success | Error`. Terminal states are reachable only
    /// from Loading; anything else is ignored.
    pub fn finish(&mut self, ok: bool) -> bool {
        if self.state != ButtonState::Loading {
            return false;
        }
        self.state = if ok {
            ButtonState::Success
        } else {
            ButtonState::Error
        };
        self.revert_at = Some(Instant::now() + REVERT_DELAY);
        true
    }

    /// Reverts an expired terminal state back to Idle.
    fn revert_if_due(&mut self, now: Instant) -> bool {
        match (self.state, self.revert_at) {
            (ButtonState::Success | ButtonState::Error, Some(at)) if now >= at => {
                self.state = ButtonState::Idle;
                self.revert_at = None;
                true
            }
            _ => false,
        }
    }

    /// Applies the rendering projection to the page.
    pub fn render(&self, page: &mut Page) {
        page.set_text(self.node, glyph(self.state));
    }
}

/// All controls injected into one page context.
#[derive(Debug, Default)]
pub struct ButtonRegistry {
    buttons: Vec<InjectedButton>,
}

impl ButtonRegistry {
    pub fn insert(&mut self, button: InjectedButton) {
        self.buttons.push(button);
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    pub fn by_node(&mut self, node: NodeId) -> Option<&mut InjectedButton> {
        self.buttons.iter_mut().find(|b| b.node == node)
    }

    pub fn state_of(&self, node: NodeId) -> Option<ButtonState> {
        self.buttons.iter().find(|b| b.node == node).map(|b| b.state)
    }

    /// The one control currently in Loading, if any. Asynchronous
    /// completion notices are routed here; with no loading control the
    /// notice is dropped silently.
    pub fn loading_mut(&mut self) -> Option<&mut InjectedButton> {
        self.buttons
            .iter_mut()
            .find(|b| b.state == ButtonState::Loading)
    }

    /// Earliest pending revert deadline, if any control is terminal.
    pub fn next_revert_at(&self) -> Option<Instant> {
        self.buttons.iter().filter_map(|b| b.revert_at).min()
    }

    /// Reverts every expired terminal control; returns the nodes that
    /// changed so the caller can re-render them.
    pub fn flush_reverts(&mut self, now: Instant) -> Vec<NodeId> {
        self.buttons
            .iter_mut()
            .filter_map(|b| b.revert_if_due(now).then_some(b.node))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_and_reentrancy() {
        let mut b = InjectedButton::new(1, 0);
        assert_eq!(b.state(), ButtonState::Idle);
        assert!(b.begin());
        // Re-entrant activation is rejected while loading.
        assert!(!b.begin());
        assert!(b.finish(true));
        assert_eq!(b.state(), ButtonState::Success);
        // Terminal states are only reachable from Loading.
        assert!(!b.finish(false));
    }

    #[test]
    fn finish_requires_loading() {
        let mut b = InjectedButton::new(1, 0);
        assert!(!b.finish(true));
        assert_eq!(b.state(), ButtonState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_state_reverts_after_delay() {
        let mut reg = ButtonRegistry::default();
        reg.insert(InjectedButton::new(1, 0));
        reg.by_node(1).unwrap().begin();
        reg.by_node(1).unwrap().finish(false);

        // Not due yet.
        tokio::time::advance(REVERT_DELAY / 2).await;
        assert!(reg.flush_reverts(Instant::now()).is_empty());

        tokio::time::advance(REVERT_DELAY).await;
        assert_eq!(reg.flush_reverts(Instant::now()), vec![1]);
        assert_eq!(reg.by_node(1).unwrap().state(), ButtonState::Idle);
    }

    #[test]
    fn notices_route_to_the_loading_control_only() {
        let mut reg = ButtonRegistry::default();
        reg.insert(InjectedButton::new(1, 0));
        reg.insert(InjectedButton::new(2, 0));
        assert!(reg.loading_mut().is_none());

        reg.by_node(2).unwrap().begin();
        assert_eq!(reg.loading_mut().unwrap().node, 2);
    }

    #[test]
    fn rendering_is_a_projection_of_state() {
        let mut page = Page::new();
        let node = page.append(page.root(), "div");
        let mut b = InjectedButton::new(node, page.root());
        b.render(&mut page);
        assert_eq!(page.text(node), glyph(ButtonState::Idle));
        b.begin();
        b.render(&mut page);
        assert_eq!(page.text(node), glyph(ButtonState::Loading));
    }
}
