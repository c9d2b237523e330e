//! Deterministic filename derivation for delivered videos.

use chrono::NaiveDate;

const SYNTH_PREFIX: &str = "x_video";
const MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".mov"];

/// Today's date in local time, the stamp used for synthesized names.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Derives the saved filename from the candidate URL.
///
/// A last path segment that already carries a media extension is kept
/// as-is. Otherwise the name is synthesized as
/// `x_video_<YYYYMMDD>_<segment>.mp4`. A random id stands in for the
/// segment only when the URL does not parse at all; an empty segment
/// stays empty.
pub fn derive_filename(raw_url: &str, date: NaiveDate) -> String {
    let Ok(parsed) = url::Url::parse(raw_url) else {
        return sanitize(&synthesized(date, &random_id()));
    };
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    if MEDIA_EXTENSIONS.iter().any(|ext| segment.contains(ext)) {
        return sanitize(segment);
    }
    sanitize(&synthesized(date, segment))
}

fn synthesized(date: NaiveDate, id: &str) -> String {
    format!("{}_{}_{}.mp4", SYNTH_PREFIX, date.format("%Y%m%d"), id)
}

fn random_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Keeps the name safe for the download backend: no path separators, no
/// control characters, bounded length.
fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if out.len() > 200 {
        let mut cut = 200;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    let trimmed = out.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        return format!("{SYNTH_PREFIX}_{}.mp4", random_id());
    }
    trimmed.to_string()
}
