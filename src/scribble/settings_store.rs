//! On-disk `OverlaySettings` as pretty JSON.

use crate::scribble::settings::OverlaySettings;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "scribble_settings.json";

/// A settings file location. Reads sanitize what they find and writes
/// sanitize what they store, so a file never round-trips an invalid range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store beside `exe_path`, the way a packaged host ships it.
    pub fn beside(exe_path: &Path) -> Result<Self> {
        let dir = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
        Ok(Self::at(dir.join(SETTINGS_FILE_NAME)))
    }

    pub fn beside_current_exe() -> Result<Self> {
        let exe_path = std::env::current_exe().context("resolve current executable")?;
        Self::beside(&exe_path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been saved yet. A blank file counts as
    /// saved defaults.
    pub fn read(&self) -> Result<Option<OverlaySettings>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read scribble settings {}", self.path.display()))
            }
        };
        if content.trim().is_empty() {
            return Ok(Some(OverlaySettings::default()));
        }
        let mut settings: OverlaySettings = serde_json::from_str(&content)
            .with_context(|| format!("parse scribble settings {}", self.path.display()))?;
        settings.sanitize();
        Ok(Some(settings))
    }

    /// What an overlay starts from: the stored settings, or the defaults when
    /// the file is missing or unreadable. Failures are logged, never raised.
    pub fn load_or_default(&self) -> OverlaySettings {
        match self.read() {
            Ok(Some(settings)) => {
                tracing::debug!(path = %self.path.display(), "scribble settings loaded");
                settings
            }
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "no scribble settings yet, using defaults");
                OverlaySettings::default()
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "scribble settings unusable, using defaults");
                OverlaySettings::default()
            }
        }
    }

    pub fn write(&self, settings: &OverlaySettings) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create settings folder {}", dir.display()))?;
        }
        let mut stored = settings.clone();
        stored.sanitize();
        let json = serde_json::to_string_pretty(&stored).context("serialize scribble settings")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write scribble settings {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "scribble settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scribble::model::{Color, PaintMode};

    fn store_in(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::at(dir.path().join(SETTINGS_FILE_NAME))
    }

    #[test]
    fn store_sits_beside_executable() {
        let store = SettingsStore::beside(Path::new("/opt/viewer/bin/viewer")).expect("store");
        assert_eq!(store.path(), Path::new("/opt/viewer/bin").join(SETTINGS_FILE_NAME));
        assert!(SettingsStore::beside(Path::new("")).is_err());
    }

    #[test]
    fn missing_file_reads_none_and_loads_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store_in(&dir);
        assert_eq!(store.read().expect("read"), None);
        assert_eq!(store.load_or_default(), OverlaySettings::default());
    }

    #[test]
    fn blank_file_reads_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store_in(&dir);
        std::fs::write(store.path(), "  \n").expect("write");
        assert_eq!(store.read().expect("read"), Some(OverlaySettings::default()));
    }

    #[test]
    fn written_settings_come_back_sanitized() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SettingsStore::at(dir.path().join("nested").join(SETTINGS_FILE_NAME));
        let settings = OverlaySettings {
            brush_color: Color::rgba(1, 2, 3, 255),
            brush_width: 12.0,
            paint_mode: PaintMode::Fill,
            low_memory_max_dimension: 512,
            ..OverlaySettings::default()
        };

        store.write(&settings).expect("write");
        assert_eq!(store.read().expect("read"), Some(settings));

        let broken = OverlaySettings {
            min_entity_scale: 5.0,
            max_entity_scale: 1.0,
            ..OverlaySettings::default()
        };
        store.write(&broken).expect("write");
        let loaded = store.load_or_default();
        assert!(loaded.min_entity_scale <= loaded.max_entity_scale);
    }

    #[test]
    fn malformed_file_names_path_and_falls_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").expect("write");

        let err = store.read().expect_err("malformed settings");
        assert!(format!("{err:#}").contains(SETTINGS_FILE_NAME));
        assert_eq!(store.load_or_default(), OverlaySettings::default());
    }
}
