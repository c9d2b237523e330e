//! yt-dlp wrapper: URL normalization and one child process per download.

use crate::service::Downloader;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use url::Url;
use xgrab_core::relay::HelperReply;

/// Normalizes a share URL for the extractor: force https, prefer the
/// twitter.com host over x.com, and drop tracking parameters.
pub fn normalize_share_url(raw: &str) -> String {
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let Ok(mut parsed) = Url::parse(&with_scheme) else {
        return with_scheme;
    };
    if matches!(parsed.host_str(), Some("x.com") | Some("www.x.com"))
        && parsed.set_host(Some("twitter.com")).is_err()
    {
        return with_scheme;
    }
    parsed.set_query(None);
    parsed.to_string()
}

pub struct YtDlp {
    program: PathBuf,
    downloads_dir: PathBuf,
}

impl YtDlp {
    pub fn new(program: PathBuf, downloads_dir: PathBuf) -> Self {
        Self {
            program,
            downloads_dir,
        }
    }

    async fn run(&self, url: &str) -> anyhow::Result<HelperReply> {
        tokio::fs::create_dir_all(&self.downloads_dir).await?;

        let template = self.downloads_dir.join("%(title)s.%(ext)s");
        let output = tokio::process::Command::new(&self.program)
            .arg("-f")
            .arg("best")
            .arg("-o")
            .arg(&template)
            .arg("--no-progress")
            // The saved path, printed once the file is in place.
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--no-simulate")
            .arg(url)
            .output()
            .await?;

        if !output.status.success() {
            return Ok(HelperReply::failure(stderr_tail(&output.stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let filepath = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string);
        let title = filepath
            .as_deref()
            .and_then(|p| Path::new(p).file_stem())
            .map(|s| s.to_string_lossy().into_owned());
        let filename = filepath
            .as_deref()
            .and_then(|p| Path::new(p).file_name())
            .map(|s| s.to_string_lossy().into_owned());
        tracing::info!(?filename, "yt-dlp finished");
        Ok(HelperReply::done(title, filename))
    }
}

/// Last few stderr lines; yt-dlp puts the actionable error at the end.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines.len().saturating_sub(4);
    let joined = lines[tail..].join("; ");
    if joined.is_empty() {
        "yt-dlp failed with no output".to_string()
    } else {
        joined
    }
}

#[async_trait]
impl Downloader for YtDlp {
    /// Every outcome is a reply; process-level errors become failure
    /// replies rather than killing the frame loop.
    async fn download(&self, url: &str) -> HelperReply {
        let normalized = normalize_share_url(url);
        tracing::debug!(%normalized, "invoking yt-dlp");
        match self.run(&normalized).await {
            Ok(reply) => reply,
            Err(err) => HelperReply::failure(format!("{err:#}")),
        }
    }
}
