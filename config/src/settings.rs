//! Application settings management

use crate::PathManager;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Application settings stored in settings.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds each playlist item is shown unless the playlist sets its own
    pub rotation_interval_secs: u64,
    /// Upper bound on generation jobs running at once
    pub max_concurrent_jobs: usize,
    /// How long finished, already-polled jobs are remembered
    pub job_retention_secs: u64,
    /// Playlist selected on first start when none is stored yet
    pub default_playlist: Option<String>,
    /// Size of images rendered by the placeholder generator
    pub placeholder_width: u32,
    pub placeholder_height: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rotation_interval_secs: 600,
            max_concurrent_jobs: 4,
            job_retention_secs: 3600,
            default_playlist: None,
            placeholder_width: 270,
            placeholder_height: 480,
        }
    }
}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found
    pub fn load() -> Self {
        match PathManager::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit path; missing or malformed files give defaults
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        toml::from_str(&content).unwrap_or_default()
    }

    /// Save settings to the settings file
    pub fn save(&self) -> Result<(), String> {
        let path = PathManager::settings_path().ok_or("Could not determine settings path")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))?;
        Ok(())
    }
}
