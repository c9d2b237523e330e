//! CDN URL normalization for the second rung of the delivery ladder.

use url::Url;

/// Strips the query string from media CDN URLs. CDN edges sometimes
/// reject requests whose auth tags have gone stale, while the bare path
/// still serves. Non-CDN URLs pass through byte-for-byte, as does
/// anything that fails to parse.
pub fn normalize_cdn_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    let on_cdn = parsed
        .host_str()
        .map(|h| h.ends_with("twimg.com"))
        .unwrap_or(false);
    if !on_cdn || parsed.query().is_none() {
        return raw.to_string();
    }
    parsed.set_query(None);
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_query_on_cdn_hosts() {
        assert_eq!(
            normalize_cdn_url("https://video.twimg.com/v/720/a.mp4?tag=12&token=x"),
            "https://video.twimg.com/v/720/a.mp4"
        );
    }

    #[test]
    fn non_cdn_urls_pass_through_unchanged() {
        let raw = "https://cdn.example/media/a.mp4?keep=me";
        assert_eq!(normalize_cdn_url(raw), raw);
    }

    #[test]
    fn cdn_url_without_query_is_untouched() {
        let raw = "https://video.twimg.com/v/720/a.mp4";
        assert_eq!(normalize_cdn_url(raw), raw);
    }

    #[test]
    fn unparsable_input_passes_through() {
        assert_eq!(normalize_cdn_url("not a url"), "not a url");
    }
}
