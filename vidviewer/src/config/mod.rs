//! Configuration.
//!
//! Process-level settings ([`AppSettings`]) come from the environment.
//! The user-editable library settings ([`LibraryConfig`]) live in a JSON file
//! managed by [`ConfigService`].

pub mod service;

pub use service::{ConfigService, LibraryConfig};

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory name under the platform config dir.
pub const APP_DIR_NAME: &str = "vidviewer";

/// Process-level settings read once at startup.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Directory holding `config.json`, the default database and logs.
    pub config_dir: PathBuf,
    pub database_url: String,
    pub log_dir: PathBuf,
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Upper bound on a single download process; `None` waits forever.
    pub download_timeout: Option<Duration>,
    /// How long finished downloads stay visible; `None` keeps them.
    pub download_retention: Option<Duration>,
}

impl AppSettings {
    /// Read settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let config_dir = env_non_empty("VIDVIEWER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_config_dir);

        let database_url = env_non_empty("DATABASE_URL")
            .unwrap_or_else(|| default_database_url(&config_dir));
        let log_dir = env_non_empty("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join("logs"));

        Self {
            database_url,
            log_dir,
            ytdlp_path: env_non_empty("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            ffmpeg_path: env_non_empty("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: env_non_empty("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
            download_timeout: env_secs("DOWNLOAD_TIMEOUT_SECS"),
            download_retention: env_secs("DOWNLOAD_RETENTION_SECS"),
            config_dir,
        }
    }

    /// Location of the library settings file.
    pub fn library_config_path(&self) -> PathBuf {
        self.config_dir.join(service::CONFIG_FILE_NAME)
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn default_database_url(config_dir: &Path) -> String {
    format!(
        "sqlite:{}?mode=rwc",
        config_dir.join("vidviewer.db").display()
    )
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_secs(key: &str) -> Option<Duration> {
    parse_secs(env_non_empty(key)?.as_str())
}

/// Positive whole seconds; zero and garbage mean "unset".
fn parse_secs(value: &str) -> Option<Duration> {
    value
        .parse::<u64>()
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}
