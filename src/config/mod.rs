mod file_config;

pub use file_config::{FileConfig, SyncConfig};

use crate::bindings::RefreshTriggerSettings;
use crate::notifications::UserId;
use anyhow::{bail, Result};
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub base_url: Option<String>,
    pub user_id: Option<String>,
    pub auth_token: Option<String>,
    pub request_timeout_sec: u64,
    pub poll_interval_secs: u64,
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Backend settings
    pub base_url: String,
    pub user_id: Option<UserId>,
    pub auth_token: Option<String>,
    pub request_timeout_sec: u64,

    // Sync settings
    pub poll_interval_secs: u64,
    pub refresh_on_foreground: bool,
    pub refresh_on_reconnect: bool,
    pub page_size: u32,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let base_url = file
            .base_url
            .or_else(|| cli.base_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("base_url must be specified via --base-url or in config file")
            })?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!("base_url must be an http(s) URL: {}", base_url);
        }

        let user_id = file
            .user_id
            .or_else(|| cli.user_id.clone())
            .filter(|id| !id.trim().is_empty())
            .map(UserId::from);

        let auth_token = file.auth_token.or_else(|| cli.auth_token.clone());

        let request_timeout_sec = file.request_timeout_sec.unwrap_or(cli.request_timeout_sec);
        if request_timeout_sec == 0 {
            bail!("request_timeout_sec must be greater than 0");
        }

        let sync = file.sync.unwrap_or_default();
        let poll_interval_secs = sync.poll_interval_secs.unwrap_or(cli.poll_interval_secs);
        let refresh_on_foreground = sync.refresh_on_foreground.unwrap_or(true);
        let refresh_on_reconnect = sync.refresh_on_reconnect.unwrap_or(true);
        let page_size = sync.page_size.unwrap_or(cli.page_size);
        if page_size == 0 {
            bail!("page_size must be greater than 0");
        }

        Ok(Self {
            base_url,
            user_id,
            auth_token,
            request_timeout_sec,
            poll_interval_secs,
            refresh_on_foreground,
            refresh_on_reconnect,
            page_size,
        })
    }

    pub fn refresh_trigger_settings(&self) -> RefreshTriggerSettings {
        RefreshTriggerSettings {
            refresh_on_foreground: self.refresh_on_foreground,
            refresh_on_reconnect: self.refresh_on_reconnect,
            poll_interval: (self.poll_interval_secs > 0)
                .then(|| Duration::from_secs(self.poll_interval_secs)),
        }
    }
}
