//! Embedded script mining: HLS playlist URLs in inline script text, plus
//! a structural search over inline JSON payloads.

use super::json_search::{collect_strings, is_media_url, MEDIA_KEYS};
use crate::page::Page;
use regex::Regex;
use std::sync::OnceLock;

fn hls_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https://[^"'\s]+\.m3u8[^"'\s]*"#).expect("hls url pattern")
    })
}

pub(super) fn mine(page: &Page) -> Vec<String> {
    let scripts = page.find_all(page.root(), |p, n| p.tag(n) == "script");
    let mut out: Vec<String> = Vec::new();

    // HLS playlists can appear in any inline script.
    for &script in &scripts {
        for m in hls_re().find_iter(page.text(script)) {
            let url = m.as_str();
            if !out.iter().any(|u| u == url) {
                out.push(url.to_string());
            }
        }
    }

    // Player data rides in JSON script payloads.
    for &script in &scripts {
        if page.attr(script, "type") != Some("application/json") {
            continue;
        }
        match serde_json::from_str(page.text(script)) {
            Ok(value) => collect_strings(&value, MEDIA_KEYS, &is_media_url, &mut out),
            // Non-payload JSON scripts are common; just skip them.
            Err(_) => continue,
        }
    }

    out
}
