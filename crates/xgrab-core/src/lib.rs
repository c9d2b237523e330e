//! xgrab-core: video-source resolution and download orchestration for
//! X/Twitter-style pages.
//!
//! The content side (page model, mutation watcher, locator, button
//! controller, resolution strategies) runs against an explicit in-memory
//! page tree so it is testable without a browser. The background side
//! (orchestrator, delivery ladder, native-helper relay) talks to the
//! content side only through the typed message bridge.

pub mod error;
pub mod logging;
pub mod settings;

pub mod bridge;
pub mod button;
pub mod content;
pub mod deliver;
pub mod locate;
pub mod page;
pub mod relay;
pub mod resolve;
pub mod watch;
