//! User settings: read by the engine, mutated only by the (external)
//! settings UI, persisted as TOML under the XDG config dir.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Settings as they travel over the wire (`settingsUpdated`) and live in
/// the settings file. Field names match the original extension storage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Master switch; when false every download request is rejected
    /// before any resolution attempt.
    pub enabled: bool,
    /// Ask the sink to prompt for a save location.
    pub save_as: bool,
    /// Lifetime counter of successful downloads.
    pub download_count: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            save_as: false,
            download_count: 0,
        }
    }
}

/// External key/value store holding [`Settings`]. The engine only loads
/// and increments; the settings UI owns everything else.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings>;

    /// Bump the download counter and return the new value.
    fn increment_download_count(&self) -> Result<u64>;
}

/// Path of the settings file (`~/.config/xgrab/settings.toml`).
pub fn settings_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("xgrab")?;
    Ok(xdg_dirs.place_config_file("settings.toml")?)
}

/// TOML-file-backed store. Creates a default file on first load.
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn open_default() -> Result<Self> {
        Ok(Self {
            path: settings_path()?,
        })
    }

    pub fn open_at(path: PathBuf) -> Self {
        Self { path }
    }

    fn write(&self, settings: &Settings) -> Result<()> {
        let toml = toml::to_string_pretty(settings)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create settings dir: {}", parent.display()))?;
        }
        fs::write(&self.path, toml)
            .with_context(|| format!("write settings: {}", self.path.display()))
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            let defaults = Settings::default();
            self.write(&defaults)?;
            return Ok(defaults);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("read settings: {}", self.path.display()))?;
        let settings = toml::from_str(&text)
            .with_context(|| format!("parse settings: {}", self.path.display()))?;
        Ok(settings)
    }

    fn increment_download_count(&self) -> Result<u64> {
        let mut settings = self.load()?;
        settings.download_count += 1;
        self.write(&settings)?;
        Ok(settings.download_count)
    }
}

/// In-memory store for tests and embedding.
#[derive(Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings> {
        Ok(*self.inner.lock().unwrap())
    }

    fn increment_download_count(&self) -> Result<u64> {
        let mut guard = self.inner.lock().unwrap();
        guard.download_count += 1;
        Ok(guard.download_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enabled_without_prompt() {
        let s = Settings::default();
        assert!(s.enabled);
        assert!(!s.save_as);
        assert_eq!(s.download_count, 0);
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["saveAs"], serde_json::json!(false));
        assert_eq!(json["downloadCount"], serde_json::json!(0));
    }

    #[test]
    fn file_store_creates_defaults_and_increments() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::open_at(dir.path().join("settings.toml"));

        let first = store.load().unwrap();
        assert_eq!(first, Settings::default());

        assert_eq!(store.increment_download_count().unwrap(), 1);
        assert_eq!(store.increment_download_count().unwrap(), 2);
        assert_eq!(store.load().unwrap().download_count, 2);
    }

    #[test]
    fn memory_store_increments() {
        let store = MemorySettingsStore::default();
        store.increment_download_count().unwrap();
        assert_eq!(store.load().unwrap().download_count, 1);
    }
}
