//! URL resolution strategy chain.
//!
//! Runs on button activation only (never during scans): the share-menu
//! strategy mutates the page transiently, so resolution is deliberately
//! on-demand. Strategies are attempted in fixed priority order and the
//! chain stops at the first one that yields at least one candidate.

mod element;
mod json_search;
mod script_scan;
mod share_menu;

pub use json_search::{collect_strings, is_media_url, MEDIA_KEYS};

use crate::page::{NodeId, Page};
use std::collections::HashSet;
use std::time::Duration;

/// How long the share menu is given to render after the triggering click.
pub const MENU_WAIT: Duration = Duration::from_millis(300);

/// Host fragment identifying the media CDN.
pub const CDN_HOST_MARKER: &str = "twimg.com";

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    ShareMenu,
    Element,
    ScriptScan,
}

/// A URL recovered by one strategy, not yet confirmed fetchable.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: String,
    pub source: StrategyKind,
}

/// Cross-activation flags the resolution pass may raise.
#[derive(Debug, Default)]
pub struct SessionFlags {
    /// Set when the share menu survived every dismissal mechanism; the
    /// runtime reloads the page after a successful delivery as a
    /// last-resort cleanup.
    pub reload_after_download: bool,
}

/// Runs the strategy chain for the video inside `container`.
///
/// Candidates are deduplicated by exact URL across the strategies actually
/// attempted; `blob:` URLs are never acceptable and are dropped before a
/// strategy's output counts as non-empty.
pub async fn resolve_candidates(
    page: &mut Page,
    container: NodeId,
    flags: &mut SessionFlags,
) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();

    for kind in [
        StrategyKind::ShareMenu,
        StrategyKind::Element,
        StrategyKind::ScriptScan,
    ] {
        let urls = match kind {
            StrategyKind::ShareMenu => share_menu::harvest(page, container, flags).await,
            StrategyKind::Element => element::inspect(page, container),
            StrategyKind::ScriptScan => script_scan::mine(page),
        };

        let mut found = Vec::new();
        for url in urls {
            if url.is_empty() || url.starts_with("blob:") {
                continue;
            }
            if seen.insert(url.clone()) {
                found.push(Candidate { url, source: kind });
            }
        }
        if !found.is_empty() {
            tracing::debug!(strategy = ?kind, count = found.len(), "resolved candidates");
            return found;
        }
    }

    tracing::debug!("no strategy produced a candidate");
    Vec::new()
}

/// Selects the conventionally best candidate: the last element. Source
/// ordering is treated as ascending quality; this helper is the single
/// place encoding that convention.
pub fn best(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.last()
}
