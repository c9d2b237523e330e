//! Direct element inspection: the video node's own source attributes.

use crate::page::{NodeId, Page};

pub(super) fn inspect(page: &Page, container: NodeId) -> Vec<String> {
    let Some(video) = page.find(container, |p, n| p.tag(n) == "video") else {
        return Vec::new();
    };

    let mut out = Vec::new();

    // Resolved src attribute, unless it is an ephemeral blob.
    if let Some(src) = page.attr(video, "src") {
        if !src.is_empty() && !src.starts_with("blob:") {
            out.push(src.to_string());
        }
    }

    // Nested <source> children.
    for &child in page.children(video) {
        if page.tag(child) == "source" {
            if let Some(src) = page.attr(child, "src") {
                if !src.is_empty() {
                    out.push(src.to_string());
                }
            }
        }
    }

    // Any data attribute whose key mentions "src".
    let data_keys: Vec<String> = page
        .attr_names(video)
        .filter(|k| k.starts_with("data-") && k.to_ascii_lowercase().contains("src"))
        .map(str::to_string)
        .collect();
    for key in data_keys {
        if let Some(value) = page.attr(video, &key) {
            if !value.is_empty() {
                out.push(value.to_string());
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_src_sources_and_data_attributes() {
        let mut page = Page::new();
        let article = page.append(page.root(), "article");
        let video = page.append(article, "video");
        page.set_attr(video, "src", "https://video.twimg.com/v/a.mp4");
        page.set_attr(video, "data-video-src", "https://video.twimg.com/v/b.mp4");
        page.set_attr(video, "data-poster", "https://pbs.twimg.com/p.jpg");
        let source = page.append(video, "source");
        page.set_attr(source, "src", "https://video.twimg.com/v/c.mp4");

        let urls = inspect(&page, article);
        assert_eq!(urls.len(), 3);
        assert!(urls.iter().all(|u| !u.contains("p.jpg")));
    }

    #[test]
    fn blob_src_is_skipped() {
        let mut page = Page::new();
        let article = page.append(page.root(), "article");
        let video = page.append(article, "video");
        page.set_attr(video, "src", "blob:https://x.com/1");

        assert!(inspect(&page, article).is_empty());
    }

    #[test]
    fn no_video_no_sources() {
        let mut page = Page::new();
        let article = page.append(page.root(), "article");
        assert!(inspect(&page, article).is_empty());
    }
}
