//! Native share-link harvest: trigger the page's own share menu, scrape
//! its download anchors, then force the menu closed again.

use super::{SessionFlags, CDN_HOST_MARKER, MENU_WAIT};
use crate::page::{NodeId, Page};
use tokio::time::sleep;

pub(super) async fn harvest(
    page: &mut Page,
    container: NodeId,
    flags: &mut SessionFlags,
) -> Vec<String> {
    let Some(share) = share_button(page, container) else {
        return Vec::new();
    };

    page.click(share);
    // Give the menu time to render.
    sleep(MENU_WAIT).await;

    let urls = download_anchor_hrefs(page);
    dismiss_menu(page);

    if open_menu(page).is_some() {
        // Every dismissal mechanism failed; schedule the nuclear option.
        tracing::debug!("share menu stuck open, reload scheduled after delivery");
        flags.reload_after_download = true;
    }

    urls
}

fn share_button(page: &Page, container: NodeId) -> Option<NodeId> {
    page.find(container, |p, n| {
        p.attr(n, "aria-label") == Some("Share post")
            || p.attr(n, "data-testid") == Some("shareButton")
    })
}

fn open_menu(page: &Page) -> Option<NodeId> {
    page.find(page.root(), |p, n| p.attr(n, "role") == Some("menu"))
}

/// Anchors the share menu exposes for the native download path.
fn download_anchor_hrefs(page: &Page) -> Vec<String> {
    page.find_all(page.root(), |p, n| {
        p.tag(n) == "a"
            && p.has_attr(n, "download")
            && p.attr(n, "href")
                .map(|h| h.contains(CDN_HOST_MARKER) && h.contains(".mp4"))
                .unwrap_or(false)
    })
    .into_iter()
    .filter_map(|n| page.attr(n, "href").map(str::to_string))
    .collect()
}

/// Closes the share menu through several independent mechanisms; any
/// single one may fail depending on page state.
fn dismiss_menu(page: &mut Page) {
    // 1. Click outside the menu.
    page.click(page.root());

    // 2. Escape key.
    page.press_escape();

    // 3. Explicit close control, if the menu renders one.
    if let Some(close) = page.find(page.root(), |p, n| p.attr(n, "aria-label") == Some("Close")) {
        page.click(close);
    }

    // 4. Remove the menu from the tree directly. Menus render inside a
    // wrapper layer; drop the wrapper unless the menu sits at top level.
    if let Some(menu) = open_menu(page) {
        let target = page
            .parent(menu)
            .filter(|&p| p != page.root())
            .unwrap_or(menu);
        page.remove(target);
    }
}
