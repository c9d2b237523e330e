//! Logging setup shared by the library embedders and the helper binary.

use anyhow::Result;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Where log lines ended up after [`init`].
#[derive(Debug)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

/// Initializes tracing for `app`: appends to
/// `$XDG_STATE_HOME/<app>/<app>.log`, or falls back to stderr when the
/// state dir cannot be used. The filter defaults to `info` globally and
/// `debug` for the app's own crates; `RUST_LOG` overrides it.
pub fn init(app: &str) -> LogTarget {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{app}=debug")));

    let (writer, target) = match state_dir(app).and_then(|dir| open_log_file(&dir, app)) {
        Ok((file, path)) => (
            BoxMakeWriter::new(Mutex::new(file)),
            LogTarget::File(path),
        ),
        Err(_) => (BoxMakeWriter::new(std::io::stderr), LogTarget::Stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    if let LogTarget::File(path) = &target {
        tracing::info!("logging to {}", path.display());
    }
    target
}

fn state_dir(app: &str) -> Result<PathBuf> {
    Ok(xdg::BaseDirectories::with_prefix(app)?.get_state_home())
}

fn open_log_file(dir: &Path, app: &str) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{app}.log"));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}
