use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Backend settings (can override CLI)
    pub base_url: Option<String>,
    pub user_id: Option<String>,
    pub auth_token: Option<String>,
    pub request_timeout_sec: Option<u64>,

    // Feature configs
    pub sync: Option<SyncConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between periodic refreshes, 0 disables polling
    pub poll_interval_secs: Option<u64>,
    pub refresh_on_foreground: Option<bool>,
    pub refresh_on_reconnect: Option<bool>,
    pub page_size: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
