//! Native helper binary: answers length-prefixed download requests on
//! stdio. stdout carries frames only; logs go to the state-dir log file
//! (or stderr as a fallback).

use clap::Parser;
use std::path::PathBuf;
use xgrab_core::logging;

mod service;
mod ytdlp;

#[derive(Debug, Parser)]
#[command(name = "xgrab-host")]
#[command(about = "Native download helper speaking length-prefixed JSON over stdio", long_about = None)]
struct Args {
    /// Directory downloads are saved into.
    /// Defaults to ~/Downloads/x_downloads.
    #[arg(long)]
    downloads_dir: Option<PathBuf>,

    /// yt-dlp executable to invoke.
    #[arg(long, default_value = "yt-dlp")]
    ytdlp: PathBuf,
}

fn default_downloads_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Downloads")
        .join("x_downloads")
}

#[tokio::main]
async fn main() {
    // Never log to stdout here; the frame protocol owns it.
    logging::init("xgrab");

    let args = Args::parse();
    let downloads_dir = args.downloads_dir.unwrap_or_else(default_downloads_dir);
    let downloader = ytdlp::YtDlp::new(args.ytdlp, downloads_dir);

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    if let Err(err) = service::serve(&downloader, stdin, stdout).await {
        eprintln!("xgrab-host error: {err:#}");
        std::process::exit(1);
    }
}
