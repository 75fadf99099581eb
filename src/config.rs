//! Global famcal configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration at ~/.config/famcal/config.toml
///
/// Calendars themselves are data, not configuration: they live in the
/// calendar store and are managed through the CLI.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct AppConfig {
    /// Where calendar/event/queue data lives. Defaults to the platform
    /// data directory.
    pub data_dir: Option<PathBuf>,

    /// Origin of the calendar front end; GETs to it are served cache-first.
    pub app_origin: Option<String>,

    /// Base URL for a same-origin Notion relay (famcal-server). When unset,
    /// the Notion API is called directly.
    pub notion_proxy_base: Option<String>,
}

pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("famcal");

    Ok(config_dir.join("config.toml"))
}

/// Load the config file, or defaults if it does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(config)
}
