//! Library configuration service.
//!
//! Holds the root library folder in memory and persists it as JSON.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::fs;
use crate::{Error, Result};

/// File name of the persisted library settings.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// User-editable library settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root folder containing `files/` and `temp/`. Empty until configured.
    #[serde(default)]
    pub folder_path: String,
}

impl LibraryConfig {
    /// The configured root, if any.
    pub fn root_folder(&self) -> Option<PathBuf> {
        let trimmed = self.folder_path.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

/// Cached access to the library settings file.
pub struct ConfigService {
    path: PathBuf,
    cache: RwLock<LibraryConfig>,
}

impl ConfigService {
    /// Load the settings file, creating it with defaults when missing.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let config = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = LibraryConfig::default();
                write_config(&path, &config).await?;
                info!(path = %path.display(), "Created default library config");
                config
            }
            Err(e) => return Err(fs::io_error("reading config", &path, e)),
        };

        Ok(Self {
            path,
            cache: RwLock::new(config),
        })
    }

    /// Current settings.
    pub fn get(&self) -> LibraryConfig {
        self.cache.read().clone()
    }

    /// Current root folder, if configured.
    pub fn root_folder(&self) -> Option<PathBuf> {
        self.cache.read().root_folder()
    }

    /// Point the library at a new root folder. The folder must already exist.
    pub async fn update_root_folder(&self, folder_path: &str) -> Result<LibraryConfig> {
        let trimmed = folder_path.trim();
        if trimmed.is_empty() || !fs::is_dir(Path::new(trimmed)).await {
            return Err(Error::RootFolderMissing(trimmed.to_string()));
        }

        let updated = LibraryConfig {
            folder_path: trimmed.to_string(),
        };
        write_config(&self.path, &updated).await?;
        *self.cache.write() = updated.clone();

        info!(folder_path = %trimmed, "Root folder updated");
        Ok(updated)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn write_config(path: &Path, config: &LibraryConfig) -> Result<()> {
    fs::ensure_parent_dir(path).await?;
    let contents = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| fs::io_error("writing config", path, e))
}
