use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend base URL. The client's built-in default is used when unset.
    pub api_base_url: Option<String>,
    pub language: String,
    /// Subsystem used when `--subsystem` is not given.
    pub subsystem: Option<u32>,
    pub request_timeout_secs: u64,
    /// Maximum number of weekly menu requests in flight at once.
    pub fan_out_limit: usize,
    /// UTC offset of the backend, used for day and week windows.
    pub server_utc_offset: String,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            language: "cs".into(),
            subsystem: None,
            request_timeout_secs: 15,
            fan_out_limit: 4,
            server_utc_offset: "+01:00".into(),
            log_level: "warn".into(),
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn server_offset(&self) -> Result<FixedOffset> {
        self.server_utc_offset
            .parse::<FixedOffset>()
            .with_context(|| format!("invalid server_utc_offset: {}", self.server_utc_offset))
    }
}

/// Config file path: `~/.config/menza/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("menza").join("config.toml"))
}

/// Load config from the default location. A missing file yields defaults.
pub fn load_config() -> Result<AppConfig> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Ok(AppConfig::default()),
    }
}

fn load_config_from(path: &Path) -> Result<AppConfig> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Ok(AppConfig::default());
    };
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))
}
