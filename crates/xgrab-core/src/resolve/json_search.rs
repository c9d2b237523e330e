//! Recursive structural search over inline JSON payloads.
//!
//! Generic visitor over `serde_json::Value`, parameterized by a string
//! predicate and an allow-list of key names. Strings are only collected
//! once the walk has passed through an allow-listed key, which bounds the
//! search and keeps unrelated strings (user text, image URLs) out.

use serde_json::Value;

/// Object keys known to carry media URLs in player payloads.
pub const MEDIA_KEYS: &[&str] = &[
    "video_info",
    "variants",
    "media_url_https",
    "video_url",
    "source",
    "contentUrl",
];

/// True for strings that reference the media CDN or a video file.
pub fn is_media_url(s: &str) -> bool {
    s.contains("video.twimg.com") || s.contains(".mp4")
}

/// Collects matching strings found beneath allow-listed keys, deduplicated,
/// in traversal order.
pub fn collect_strings(
    value: &Value,
    keys: &[&str],
    matches: &dyn Fn(&str) -> bool,
    out: &mut Vec<String>,
) {
    walk(value, keys, matches, false, out);
}

fn walk(
    value: &Value,
    keys: &[&str],
    matches: &dyn Fn(&str) -> bool,
    armed: bool,
    out: &mut Vec<String>,
) {
    match value {
        Value::String(s) => {
            if armed && matches(s) && !out.iter().any(|u| u == s) {
                out.push(s.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, keys, matches, armed, out);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, keys, matches, armed || keys.contains(&key.as_str()), out);
            }
        }
        _ => {}
    }
}
