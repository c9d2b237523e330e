//! Shared fixtures: a scripted download sink and canned page layouts.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use xgrab_core::bridge::Bridge;
use xgrab_core::deliver::{DeliveryMode, DownloadSink, Orchestrator};
use xgrab_core::error::SinkError;
use xgrab_core::page::{NodeId, Page};
use xgrab_core::relay::RelayLink;
use xgrab_core::settings::{MemorySettingsStore, Settings, SettingsStore};

/// Sink whose `begin` outcomes are scripted per call; records every call.
pub struct FakeSink {
    outcomes: Mutex<VecDeque<Result<u32, SinkError>>>,
    pub begun: Mutex<Vec<String>>,
    pub fetches: Mutex<u32>,
}

impl FakeSink {
    pub fn scripted(outcomes: Vec<Result<u32, SinkError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            begun: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
        }
    }

    pub fn always_ok() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn begun_urls(&self) -> Vec<String> {
        self.begun.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloadSink for FakeSink {
    async fn begin(&self, url: &str, _filename: &str, _save_as: bool) -> Result<u32, SinkError> {
        self.begun.lock().unwrap().push(url.to_string());
        self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(1))
    }

    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, SinkError> {
        *self.fetches.lock().unwrap() += 1;
        Ok(b"payload".to_vec())
    }

    async fn serve_payload(&self, filename: &str, _bytes: Vec<u8>) -> Result<String, SinkError> {
        Ok(format!("staged/{filename}"))
    }

    async fn revoke_payload(&self, _handle: &str) {}
}

/// Wires a bridge, spawns an orchestrator over `sink`, and returns the
/// page port plus the shared settings store.
pub fn spawn_pipeline(
    sink: Arc<FakeSink>,
    settings: Settings,
) -> (xgrab_core::bridge::PagePort, Arc<MemorySettingsStore>) {
    let store = Arc::new(MemorySettingsStore::new(settings));
    let mut bridge = Bridge::new();
    let port = bridge.attach_page();
    let orch_port = bridge.orchestrator_port().unwrap();
    let orch = Orchestrator::new(
        SharedSink(sink),
        Arc::clone(&store) as Arc<dyn SettingsStore>,
        DeliveryMode::Local,
        RelayLink::new(None),
    )
    .unwrap();
    tokio::spawn(orch.serve(orch_port));
    (port, store)
}

/// Lets tests keep a handle on the sink the orchestrator consumed.
pub struct SharedSink(pub Arc<FakeSink>);

#[async_trait]
impl DownloadSink for SharedSink {
    async fn begin(&self, url: &str, filename: &str, save_as: bool) -> Result<u32, SinkError> {
        self.0.begin(url, filename, save_as).await
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SinkError> {
        self.0.fetch(url).await
    }

    async fn serve_payload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, SinkError> {
        self.0.serve_payload(filename, bytes).await
    }

    async fn revoke_payload(&self, handle: &str) {
        self.0.revoke_payload(handle).await
    }
}

pub const SHARE_URL: &str =
    "https://video.twimg.com/ext_tw_video/1/pu/vid/720x900/clip.mp4?tag=12";

/// A timeline post whose share button opens a menu with one download anchor.
pub fn post_with_share_menu(page: &mut Page) -> NodeId {
    let article = page.append(page.root(), "article");
    let wrapper = page.append(article, "div");
    page.append(wrapper, "video");

    let actions = page.append(article, "div");
    page.set_attr(actions, "role", "group");
    let like = page.append(actions, "div");
    page.set_attr(like, "data-testid", "like");

    let share = page.append(actions, "div");
    page.set_attr(share, "aria-label", "Share post");
    page.on_click(share, |p| {
        let layer = p.append(p.root(), "div");
        let menu = p.append(layer, "div");
        p.set_attr(menu, "role", "menu");
        let link = p.append(menu, "a");
        p.set_attr(link, "download", "");
        p.set_attr(link, "href", SHARE_URL);
    });
    article
}

/// A plain timeline post with a direct (non-blob) video src.
pub fn post_with_video_src(page: &mut Page, src: &str) -> NodeId {
    let article = page.append(page.root(), "article");
    let wrapper = page.append(article, "div");
    let video = page.append(wrapper, "video");
    page.set_attr(video, "src", src);
    let actions = page.append(article, "div");
    page.set_attr(actions, "role", "group");
    let like = page.append(actions, "div");
    page.set_attr(like, "data-testid", "like");
    article
}
