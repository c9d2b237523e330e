//! Per-context flight slots.
//!
//! At most one delivery runs per page context. The slot set hands out an
//! RAII guard; dropping the guard frees the slot on every exit path, so a
//! panicking or cancelled delivery can never wedge its context.

use crate::bridge::ContextId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct FlightSlots {
    held: Arc<Mutex<HashSet<ContextId>>>,
}

impl FlightSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot for `ctx`, or `None` if a delivery is already in
    /// flight there.
    pub fn try_acquire(&self, ctx: ContextId) -> Option<FlightGuard> {
        let mut held = self.held.lock().unwrap();
        if !held.insert(ctx) {
            return None;
        }
        Some(FlightGuard {
            ctx,
            held: Arc::clone(&self.held),
        })
    }

    pub fn in_flight(&self, ctx: ContextId) -> bool {
        self.held.lock().unwrap().contains(&ctx)
    }
}

pub struct FlightGuard {
    ctx: ContextId,
    held: Arc<Mutex<HashSet<ContextId>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.held.lock().unwrap().remove(&self.ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_context_is_refused() {
        let slots = FlightSlots::new();
        let guard = slots.try_acquire(7);
        assert!(guard.is_some());
        assert!(slots.try_acquire(7).is_none());
        // A different context is unaffected.
        assert!(slots.try_acquire(8).is_some());
    }

    #[test]
    fn drop_frees_the_slot() {
        let slots = FlightSlots::new();
        let guard = slots.try_acquire(7).unwrap();
        assert!(slots.in_flight(7));
        drop(guard);
        assert!(!slots.in_flight(7));
        assert!(slots.try_acquire(7).is_some());
    }
}
