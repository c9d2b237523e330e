//! Integration tests: full pipeline from page mutations through control
//! injection, activation, URL resolution, and the delivery ladder.

mod common;

use common::FakeSink;
use std::sync::Arc;
use xgrab_core::button::{ButtonState, REVERT_DELAY};
use xgrab_core::content::PageRuntime;
use xgrab_core::error::SinkError;
use xgrab_core::locate::ViewKind;
use xgrab_core::page::Page;
use xgrab_core::settings::{Settings, SettingsStore};
use xgrab_core::watch::{self, QUIET_WINDOW};

#[tokio::test(start_paused = true)]
async fn feed_mutations_inject_each_post_exactly_once() {
    let sink = Arc::new(FakeSink::always_ok());
    let (port, _store) = common::spawn_pipeline(Arc::clone(&sink), Settings::default());

    let mut page = Page::new();
    common::post_with_video_src(&mut page, "https://video.twimg.com/v/360/a.mp4");
    let mut rt = PageRuntime::new(page, ViewKind::Timeline, port, Settings::default());

    let (events, mut changes) = watch::channel();

    // First burst of mutations: one scan, one control.
    events.content_changed();
    events.content_changed();
    changes.next_scan(QUIET_WINDOW).await.unwrap();
    assert_eq!(rt.scan().len(), 1);

    // New post arrives; the old one must not be re-processed.
    common::post_with_video_src(&mut rt.page, "https://video.twimg.com/v/360/b.mp4");
    events.content_changed();
    changes.next_scan(QUIET_WINDOW).await.unwrap();
    assert_eq!(rt.scan().len(), 1);
    assert_eq!(rt.button_count(), 2);

    // A burst with nothing new injects nothing.
    events.content_changed();
    changes.next_scan(QUIET_WINDOW).await.unwrap();
    assert!(rt.scan().is_empty());
}

#[tokio::test(start_paused = true)]
async fn share_menu_post_downloads_end_to_end() {
    let sink = Arc::new(FakeSink::always_ok());
    let (port, store) = common::spawn_pipeline(Arc::clone(&sink), Settings::default());

    let mut page = Page::new();
    common::post_with_share_menu(&mut page);
    let mut rt = PageRuntime::new(page, ViewKind::Timeline, port, Settings::default());
    let control = rt.scan()[0];

    let state = rt.activate(control).await.unwrap();
    assert_eq!(state, ButtonState::Success);

    // The share-menu anchor URL went to the sink untouched.
    assert_eq!(sink.begun_urls(), vec![common::SHARE_URL.to_string()]);
    // The menu was forced closed again.
    assert!(rt
        .page
        .find(rt.page.root(), |p, n| p.attr(n, "role") == Some("menu"))
        .is_none());
    // Counter bumped, no reload needed.
    assert_eq!(store.load().unwrap().download_count, 1);
    assert!(!rt.page.reload_requested());

    // Terminal state reverts on its own.
    tokio::time::advance(REVERT_DELAY).await;
    rt.flush_reverts();
    assert_eq!(rt.button_state(control), Some(ButtonState::Idle));
}

#[tokio::test(start_paused = true)]
async fn second_click_during_terminal_state_sends_nothing() {
    let sink = Arc::new(FakeSink::always_ok());
    let (port, _store) = common::spawn_pipeline(Arc::clone(&sink), Settings::default());

    let mut page = Page::new();
    common::post_with_video_src(&mut page, "https://video.twimg.com/v/720/a.mp4");
    let mut rt = PageRuntime::new(page, ViewKind::Timeline, port, Settings::default());
    let control = rt.scan()[0];

    assert_eq!(rt.activate(control).await, Some(ButtonState::Success));
    // Still in Success; the click is swallowed by the state machine.
    assert_eq!(rt.activate(control).await, Some(ButtonState::Success));
    assert_eq!(sink.begun_urls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_ladder_surfaces_the_last_rung_error() {
    let sink = Arc::new(FakeSink::scripted(vec![
        Err(SinkError::Http(403)),
        Err(SinkError::Http(404)),
        Err(SinkError::Http(500)),
    ]));
    let (port, store) = common::spawn_pipeline(Arc::clone(&sink), Settings::default());

    let mut page = Page::new();
    common::post_with_video_src(
        &mut page,
        "https://video.twimg.com/v/720/clip.mp4?tag=9",
    );
    let mut rt = PageRuntime::new(page, ViewKind::Timeline, port, Settings::default());
    let control = rt.scan()[0];

    let state = rt.activate(control).await.unwrap();
    assert_eq!(state, ButtonState::Error);

    // All three rungs ran: direct, normalized, staged payload.
    let urls = sink.begun_urls();
    assert_eq!(urls.len(), 3);
    assert_eq!(urls[1], "https://video.twimg.com/v/720/clip.mp4");
    assert!(urls[2].starts_with("staged/"));
    assert_eq!(store.load().unwrap().download_count, 0);
}

#[tokio::test(start_paused = true)]
async fn ladder_falls_back_to_the_normalized_url() {
    let sink = Arc::new(FakeSink::scripted(vec![Err(SinkError::Http(403)), Ok(5)]));
    let (port, _store) = common::spawn_pipeline(Arc::clone(&sink), Settings::default());

    let mut page = Page::new();
    common::post_with_video_src(
        &mut page,
        "https://video.twimg.com/v/720/clip.mp4?tag=9",
    );
    let mut rt = PageRuntime::new(page, ViewKind::Timeline, port, Settings::default());
    let control = rt.scan()[0];

    assert_eq!(rt.activate(control).await, Some(ButtonState::Success));
    let urls = sink.begun_urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[1], "https://video.twimg.com/v/720/clip.mp4");
    // The fetch rung never ran.
    assert_eq!(*sink.fetches.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn stuck_share_menu_requests_reload_after_success() {
    let sink = Arc::new(FakeSink::always_ok());
    let (port, _store) = common::spawn_pipeline(Arc::clone(&sink), Settings::default());

    let mut page = Page::new();
    common::post_with_share_menu(&mut page);
    // Hostile page: outside clicks respawn the menu, so no dismissal wins.
    let root = page.root();
    page.on_click(root, |p| {
        let menu = p.append(p.root(), "div");
        p.set_attr(menu, "role", "menu");
    });
    let mut rt = PageRuntime::new(page, ViewKind::Timeline, port, Settings::default());
    let control = rt.scan()[0];

    assert_eq!(rt.activate(control).await, Some(ButtonState::Success));
    assert!(rt.page.reload_requested());
}

#[tokio::test(start_paused = true)]
async fn disabled_downloads_never_reach_the_sink() {
    let sink = Arc::new(FakeSink::always_ok());
    let disabled = Settings {
        enabled: false,
        ..Settings::default()
    };
    let (port, _store) = common::spawn_pipeline(Arc::clone(&sink), disabled);

    let mut page = Page::new();
    common::post_with_share_menu(&mut page);
    let mut rt = PageRuntime::new(page, ViewKind::Timeline, port, disabled);
    let control = rt.scan()[0];

    assert_eq!(rt.activate(control).await, Some(ButtonState::Error));
    assert!(sink.begun_urls().is_empty());
    // The share menu was never even opened.
    assert!(rt
        .page
        .find(rt.page.root(), |p, n| p.attr(n, "role") == Some("menu"))
        .is_none());
}
