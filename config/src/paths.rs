use std::path::PathBuf;
use std::sync::OnceLock;

static DATA_DIR_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Environment variable that points the database somewhere else
pub const DB_PATH_ENV: &str = "TRIPTIC_DB_PATH";

pub struct PathManager;

impl PathManager {
    /// Use a custom data directory instead of the platform default.
    /// Only the first call has an effect.
    pub fn set_data_dir(path: PathBuf) {
        let _ = DATA_DIR_OVERRIDE.set(path);
    }

    /// `<platform data dir>/triptic`, e.g. `~/.local/share/triptic`
    pub fn data_dir() -> Option<PathBuf> {
        if let Some(d) = DATA_DIR_OVERRIDE.get() {
            return Some(d.clone());
        }
        dirs::data_dir().map(|d| d.join("triptic"))
    }

    pub fn config_dir() -> Option<PathBuf> {
        if let Some(d) = DATA_DIR_OVERRIDE.get() {
            return Some(d.clone());
        }
        dirs::config_dir().map(|d| d.join("triptic"))
    }

    /// SQLite metadata database; `TRIPTIC_DB_PATH` wins when set
    pub fn db_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(DB_PATH_ENV).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        Self::data_dir().map(|d| d.join("triptic.db"))
    }

    /// Content-addressed image and video storage
    pub fn blobs_dir() -> Option<PathBuf> {
        Self::data_dir().map(|d| d.join("blobs"))
    }

    pub fn logs_dir() -> Option<PathBuf> {
        Self::data_dir().map(|d| d.join("logs"))
    }

    pub fn log_file_path() -> Option<PathBuf> {
        Self::logs_dir().map(|d| d.join("triptic.log"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.toml"))
    }

    pub fn ensure_dirs_exist() -> std::io::Result<()> {
        for dir in [
            Self::data_dir(),
            Self::config_dir(),
            Self::blobs_dir(),
            Self::logs_dir(),
        ]
        .into_iter()
        .flatten()
        {
            std::fs::create_dir_all(&dir)?;
        }
        if let Some(parent) = Self::db_path().as_deref().and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
