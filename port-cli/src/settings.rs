//! Persisted settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use port_detect::ScannerConfig;
use port_events::PipelineConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Settings stored in `settings.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Hot-plug pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Which connectors the scanner reports
    #[serde(default)]
    pub scanner: ScannerConfig,
}

impl Settings {
    /// `$XDG_CONFIG_HOME/portwatch`, or `~/.config/portwatch`
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("portwatch"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("portwatch"))
    }

    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load from `path`, or the default location when `None`
    ///
    /// A missing or unreadable file yields the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Self::default();
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No settings at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!("Ignoring invalid settings in {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Save to `path`, or the default location when `None`
    pub fn save(&self, path: Option<&Path>) -> anyhow::Result<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::default_path)
            .context("Could not determine settings path")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use port_events::Blacklist;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("portwatch-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "pipeline": { "debounce_ms": 250 } }"#).unwrap();

        assert_eq!(settings.pipeline.debounce_ms, 250);
        assert!(settings.pipeline.usb_watch);
        assert_eq!(settings.scanner, ScannerConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch_path("roundtrip.json");
        let mut settings = Settings::default();
        settings.pipeline.blacklist = Blacklist::new(["COM1"]);
        settings.pipeline.emit_all_changes = true;

        let written = settings.save(Some(path.as_path())).unwrap();
        assert_eq!(written, path);
        assert_eq!(Settings::load(Some(path.as_path())), settings);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_or_missing_file_falls_back() {
        let path = scratch_path("broken.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(Settings::load(Some(path.as_path())), Settings::default());
        assert_eq!(
            Settings::load(Some(scratch_path("absent.json").as_path())),
            Settings::default()
        );

        let _ = std::fs::remove_file(&path);
    }
}
