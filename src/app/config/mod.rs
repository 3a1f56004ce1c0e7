use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

pub mod user;

pub use user::{ApiConfig, NetworkConfig, PlaybackConfig, UserConfig};

pub struct AppConfig;

impl AppConfig {
    pub fn get_config_dir() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cloudplay")
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_log_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("cloudplay")
    }

    /// Load `path` (or the default location). A missing file is created with
    /// defaults; a malformed one is reported and ignored.
    pub fn load(path: Option<&Path>) -> UserConfig {
        let default_path = Self::get_config_path();
        let path = path.unwrap_or(&default_path);

        if !path.exists() {
            let config = UserConfig::default();
            if let Err(e) = Self::write(path, &config) {
                warn!("could not write default config: {:#}", e);
            } else {
                info!(path = %path.display(), "wrote default config");
            }
            return config;
        }

        match Self::read(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring config: {:#}", e);
                UserConfig::default()
            }
        }
    }

    pub fn read(path: &Path) -> Result<UserConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn write(path: &Path, config: &UserConfig) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        fs::write(path, Self::render(config)?)
            .with_context(|| format!("writing {}", path.display()))
    }

    pub fn render(config: &UserConfig) -> Result<String> {
        toml::to_string_pretty(config).context("serializing config")
    }
}
