use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

pub const DEFAULT_SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/1hCqLjZ8KcOV8sR9Q65mltuUwYLcuGmKsuN2HZz5Ig1o/export?format=csv";
pub const DEFAULT_THUMBNAIL_BASE_URL: &str =
    "https://filedn.eu/lOjLpzJofleJiC3OIhcsQL0/ERPThumbnails";
pub const CONFIG_ENV: &str = "PRICELIST_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerBackend {
    #[default]
    Serial,
    Replay,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub backend: ScannerBackend,
    pub replay_files: Vec<PathBuf>,
    pub frame_interval_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            backend: ScannerBackend::Serial,
            replay_files: Vec::new(),
            frame_interval_ms: 250,
            poll_interval_ms: 50,
        }
    }
}

impl ScannerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sheet_url: String,
    pub cache_path: Option<PathBuf>,
    pub thumbnail_base_url: Option<String>,
    pub timezone: Option<String>,
    pub clear_after_secs: u64,
    pub scanner: ScannerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sheet_url: DEFAULT_SHEET_URL.to_string(),
            cache_path: None,
            thumbnail_base_url: Some(DEFAULT_THUMBNAIL_BASE_URL.to_string()),
            timezone: None,
            clear_after_secs: 2,
            scanner: ScannerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the config file; a file that does not exist means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text, path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn default_path() -> PathBuf {
        if let Some(p) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(p);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pricelist")
            .join("config.toml")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pricelist")
                .join("pricelist.db")
        })
    }

    /// Where item thumbnails are fetched from. An empty value turns them off.
    pub fn thumbnail_base(&self) -> Option<&str> {
        self.thumbnail_base_url
            .as_deref()
            .map(|base| base.trim_end_matches('/'))
            .filter(|base| !base.is_empty())
    }

    /// Thumbnails are kept next to the cache database.
    pub fn thumbnail_dir(&self) -> PathBuf {
        let cache = self.cache_path();
        cache
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join("thumbnails")
    }

    pub fn timezone(&self) -> Tz {
        match self.timezone.as_deref() {
            None => Tz::UTC,
            Some(name) => name.parse().unwrap_or_else(|_| {
                log::warn!("Unknown timezone {:?}, showing times in UTC", name);
                Tz::UTC
            }),
        }
    }

    pub fn clear_after(&self) -> Option<Duration> {
        (self.clear_after_secs > 0).then(|| Duration::from_secs(self.clear_after_secs))
    }
}
