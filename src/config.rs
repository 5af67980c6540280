use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_MAX_HISTORY;
use crate::io::{DEFAULT_JPEG_QUALITY, DEFAULT_PREVIEW_MAX};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
/// Persisted settings for PixelLab. Every key is optional.
pub struct AppConfig {
    pub max_history: Option<usize>,
    pub preview_max: Option<u32>,
    pub jpeg_quality: Option<u8>,
    pub output_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pixellab").join("config.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), "ignoring unreadable config: {err}");
            Self::default()
        })
    }

    /// Writes config to disk, ignoring filesystem/serialization errors.
    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(s) = toml::to_string_pretty(self) {
            let _ = std::fs::write(path, s);
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history.unwrap_or(DEFAULT_MAX_HISTORY).max(1)
    }

    pub fn preview_max(&self) -> u32 {
        self.preview_max.unwrap_or(DEFAULT_PREVIEW_MAX).max(1)
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("out"))
    }
}
