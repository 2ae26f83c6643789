// Download settings persisted as a JSON file

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSettings {
    pub download_path: String,
    pub default_format: String,
    pub default_quality: String,
    pub auto_open_folder: bool,
}

impl DownloadSettings {
    pub fn with_download_path(download_path: &Path) -> Self {
        Self {
            download_path: download_path.to_string_lossy().to_string(),
            default_format: "best".to_string(),
            default_quality: String::new(),
            auto_open_folder: false,
        }
    }

    /// Overwrite only the fields present in `update`
    pub fn merged(mut self, update: SettingsUpdate) -> Self {
        if let Some(v) = update.download_path {
            self.download_path = v;
        }
        if let Some(v) = update.default_format {
            self.default_format = v;
        }
        if let Some(v) = update.default_quality {
            self.default_quality = v;
        }
        if let Some(v) = update.auto_open_folder {
            self.auto_open_folder = v;
        }
        self
    }
}

/// Partial settings, as stored on disk or sent by the client
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub download_path: Option<String>,
    pub default_format: Option<String>,
    pub default_quality: Option<String>,
    pub auto_open_folder: Option<bool>,
}

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Serialize(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Failed to write settings: {}", e),
            Self::Serialize(e) => write!(f, "Failed to encode settings: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<std::io::Error> for SettingsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e)
    }
}

/// Reads and writes the settings file. Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    defaults: DownloadSettings,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, default_download_dir: &Path) -> Self {
        Self {
            path: path.into(),
            defaults: DownloadSettings::with_download_path(default_download_dir),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> &DownloadSettings {
        &self.defaults
    }

    /// Stored values merged over defaults. A missing file is created with the
    /// defaults; an unreadable one yields the defaults.
    pub async fn load(&self) -> DownloadSettings {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Err(e) = self.write(&self.defaults).await {
                    tracing::warn!("[settings] cannot create {}: {}", self.path.display(), e);
                }
                return self.defaults.clone();
            }
            Err(e) => {
                tracing::error!("[settings] error reading {}: {}", self.path.display(), e);
                return self.defaults.clone();
            }
        };

        match serde_json::from_str::<SettingsUpdate>(&raw) {
            Ok(stored) => self.defaults.clone().merged(stored),
            Err(e) => {
                tracing::error!("[settings] malformed {}: {}", self.path.display(), e);
                self.defaults.clone()
            }
        }
    }

    /// Apply a partial update and write the full result back
    pub async fn save(&self, update: SettingsUpdate) -> Result<DownloadSettings, SettingsError> {
        let updated = self.load().await.merged(update);
        self.write(&updated).await?;
        tracing::info!("[settings] saved to {}", self.path.display());
        Ok(updated)
    }

    /// Current download directory; a blank setting means the default
    pub async fn download_dir(&self) -> PathBuf {
        let settings = self.load().await;
        if settings.download_path.trim().is_empty() {
            PathBuf::from(&self.defaults.download_path)
        } else {
            PathBuf::from(settings.download_path)
        }
    }

    async fn write(&self, settings: &DownloadSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
