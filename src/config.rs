// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::CameraBackendType;
use crate::constants::BitratePreset;
use crate::constants::storage::{
    CONFIG_DIR_NAME, CONFIG_FILE, DEFAULT_SAVE_FOLDER, TEMP_DIR_NAME,
};
use crate::errors::AppResult;
use crate::pipelines::photo::EncodingQuality;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (Virtual or GStreamer)
    pub backend: CameraBackendType,
    /// Folder created under the user's Pictures and Videos directories
    pub library_folder: String,
    /// Photo directory override
    pub photo_directory: Option<PathBuf>,
    /// Video directory override
    pub video_directory: Option<PathBuf>,
    /// Directory for in-progress recordings
    pub temp_directory: Option<PathBuf>,
    /// Still photo JPEG quality
    pub photo_quality: EncodingQuality,
    /// Video encoder bitrate preset (Low, Medium, High)
    pub bitrate_preset: BitratePreset,
    /// Ring the terminal bell when recording starts and stops
    pub recording_cues: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            library_folder: DEFAULT_SAVE_FOLDER.to_string(),
            photo_directory: None,
            video_directory: None,
            temp_directory: None,
            photo_quality: EncodingQuality::default(),
            bitrate_preset: BitratePreset::default(), // Default to Medium
            recording_cues: true,
        }
    }
}

impl Config {
    /// Default config file: `<config_dir>/snapcam/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE))
    }

    /// Load from the default location
    ///
    /// A missing file yields the defaults; an unreadable one is reported and
    /// replaced by the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No config directory, using default configuration");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
            Self::default()
        })
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Write to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Photo library directory
    pub fn photo_dir(&self) -> PathBuf {
        self.photo_directory
            .clone()
            .unwrap_or_else(|| library_root(dirs::picture_dir()).join(&self.library_folder))
    }

    /// Video library directory
    pub fn video_dir(&self) -> PathBuf {
        self.video_directory
            .clone()
            .unwrap_or_else(|| library_root(dirs::video_dir()).join(&self.library_folder))
    }

    /// Directory for temporary recordings
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_directory
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(TEMP_DIR_NAME))
    }
}

/// Media directory, falling back to home and then the working directory
fn library_root(media_dir: Option<PathBuf>) -> PathBuf {
    media_dir
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}
