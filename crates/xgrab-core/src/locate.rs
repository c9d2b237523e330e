//! Container/toolbar locator: tiered fallback chains over the page tree.
//!
//! Given a detected video node, resolve the post container that should
//! host the download control, and the action toolbar inside it. Both
//! lookups are ordered lists of pure `(&ctx) -> Option<NodeId>` tiers
//! evaluated left to right by [`first_some`]; the first hit wins.

use crate::page::{NodeId, Page};

/// Idempotency marker set on a container the moment it is selected, so
/// repeated scans never double-inject.
pub const PROCESSED_ATTR: &str = "data-xgrab-processed";

/// How many ancestor levels the semantic-post tier is allowed to climb.
pub const ANCESTOR_LIMIT: usize = 5;

/// `data-testid` values identifying the action row of a post.
const ACTION_MARKERS: [&str; 3] = ["reply", "retweet", "like"];

/// What kind of navigation context the page is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Regular timeline / feed.
    Timeline,
    /// Dedicated media-detail view (single post front and center).
    MediaDetail,
}

/// Evaluates tiers in order and returns the first non-`None` result.
pub fn first_some<C, T>(ctx: &C, tiers: &[&dyn Fn(&C) -> Option<T>]) -> Option<T> {
    tiers.iter().find_map(|tier| tier(ctx))
}

struct Ctx<'p> {
    page: &'p Page,
    video: NodeId,
    view: ViewKind,
}

/// Nearest overlay (`role="dialog"`) ancestor, if the node sits in one.
fn overlay_of(page: &Page, id: NodeId) -> Option<NodeId> {
    page.ancestors(id)
        .find(|&n| page.attr(n, "role") == Some("dialog"))
}

fn is_post(page: &Page, id: NodeId) -> bool {
    page.tag(id) == "article" || page.attr(id, "data-testid") == Some("tweet")
}

// Tier 1: inside a modal/overlay, prefer the post article within it.
fn overlay_article(ctx: &Ctx) -> Option<NodeId> {
    let overlay = overlay_of(ctx.page, ctx.video)?;
    ctx.page.find(overlay, |p, n| p.tag(n) == "article")
}

// Tier 2: on a media-detail view, prefer the primary article in the main
// content region.
fn detail_primary_article(ctx: &Ctx) -> Option<NodeId> {
    if ctx.view != ViewKind::MediaDetail {
        return None;
    }
    let main = ctx.page.find(ctx.page.root(), |p, n| {
        p.tag(n) == "main" || p.attr(n, "data-testid") == Some("primaryColumn")
    })?;
    ctx.page.find(main, |p, n| p.tag(n) == "article")
}

// Tier 3: nearest semantically-tagged post ancestor, bounded climb.
fn tagged_post_ancestor(ctx: &Ctx) -> Option<NodeId> {
    ctx.page
        .ancestors(ctx.video)
        .take(ANCESTOR_LIMIT)
        .find(|&n| is_post(ctx.page, n))
}

// Tier 4: nearest generic list cell, else the node's direct parent.
fn generic_cell(ctx: &Ctx) -> Option<NodeId> {
    ctx.page
        .ancestors(ctx.video)
        .find(|&n| {
            ctx.page.attr(n, "data-testid") == Some("cellInnerDiv")
                || ctx.page.attr(n, "role") == Some("listitem")
        })
        .or_else(|| ctx.page.parent(ctx.video))
}

/// Resolves the post container enclosing `video`.
pub fn container_for(page: &Page, video: NodeId, view: ViewKind) -> Option<NodeId> {
    let ctx = Ctx { page, video, view };
    first_some(
        &ctx,
        &[
            &overlay_article,
            &detail_primary_article,
            &tagged_post_ancestor,
            &generic_cell,
        ],
    )
}

struct ToolbarCtx<'p> {
    page: &'p Page,
    container: NodeId,
}

fn group_with_action_markers(ctx: &ToolbarCtx) -> Option<NodeId> {
    ctx.page
        .find_all(ctx.container, |p, n| p.attr(n, "role") == Some("group"))
        .into_iter()
        .find(|&group| {
            ctx.page
                .find(group, |p, n| {
                    p.attr(n, "data-testid")
                        .map(|t| ACTION_MARKERS.contains(&t))
                        .unwrap_or(false)
                })
                .is_some()
        })
}

fn first_group_with_buttons(ctx: &ToolbarCtx) -> Option<NodeId> {
    // Only widen to the whole document when the post sits in an overlay.
    let scope = if overlay_of(ctx.page, ctx.container).is_some() {
        ctx.page.root()
    } else {
        ctx.container
    };
    ctx.page
        .find_all(scope, |p, n| p.attr(n, "role") == Some("group"))
        .into_iter()
        .find(|&group| {
            ctx.page
                .find(group, |p, n| {
                    p.tag(n) == "button" || p.attr(n, "role") == Some("button")
                })
                .is_some()
        })
}

/// Resolves the action toolbar inside `container`, if any.
pub fn toolbar_for(page: &Page, container: NodeId) -> Option<NodeId> {
    let ctx = ToolbarCtx { page, container };
    first_some(&ctx, &[&group_with_action_markers, &first_group_with_buttons])
}
