use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notification_sync::config::{AppConfig, CliConfig, FileConfig};
use notification_sync::notifications::NotificationFilters;
use notification_sync::{
    ChannelPlatform, ConnectivityObserver, ConnectivityState, HttpNotificationSource,
    NotificationDataSource, NotificationSyncCore, RefreshTriggers, UnreadBadge,
};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Base URL of the notification backend.
    #[clap(long)]
    pub base_url: Option<String>,

    /// Identifier of the user whose notifications are watched.
    #[clap(long)]
    pub user_id: Option<String>,

    /// Bearer token sent with every backend request.
    #[clap(long)]
    pub auth_token: Option<String>,

    /// Timeout in seconds for backend requests.
    #[clap(long, default_value_t = 10)]
    pub request_timeout_sec: u64,

    /// Seconds between periodic unread count refreshes. Set to 0 to disable polling.
    #[clap(long, default_value_t = 60)]
    pub poll_interval_secs: u64,

    /// Number of notifications fetched per page.
    #[clap(long, default_value_t = 20)]
    pub page_size: u32,

    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Print the first page of notifications and exit.
    #[clap(long)]
    pub list: bool,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            base_url: args.base_url.clone(),
            user_id: args.user_id.clone(),
            auth_token: args.auth_token.clone(),
            request_timeout_sec: args.request_timeout_sec,
            poll_interval_secs: args.poll_interval_secs,
            page_size: args.page_size,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli_config: CliConfig = (&cli_args).into();
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let data_source: Arc<dyn NotificationDataSource> = Arc::new(HttpNotificationSource::new(
        &config.base_url,
        config.request_timeout_sec,
        config.auth_token.clone(),
    )?);
    info!("Using notification backend at {}", config.base_url);

    let Some(user_id) = config.user_id.clone() else {
        anyhow::bail!("user_id must be specified via --user-id or in config file");
    };

    if cli_args.list {
        let page = data_source
            .get_user_notifications(&user_id, 0, config.page_size, &NotificationFilters::default())
            .await
            .context("Failed to fetch notifications")?;
        for notification in &page.data {
            let marker = if notification.is_unread() { "*" } else { " " };
            println!(
                "{} {} [{}] {}",
                marker,
                notification.id,
                notification.notification_type.as_str(),
                notification.title
            );
        }
        println!("{} of {} notifications", page.data.len(), page.total);
        return Ok(());
    }

    let core = NotificationSyncCore::new(data_source);
    let mut failures = core.refresh_failures();

    // A desktop process is always in the foreground; connectivity changes are not reported.
    let (platform, _platform_events) = ChannelPlatform::new(ConnectivityState::default());
    let observer = ConnectivityObserver::new(Arc::new(platform));
    observer.initialize()?;

    let mut triggers = RefreshTriggers::start(&core, &observer, &config.refresh_trigger_settings());

    core.set_identity(Some(user_id.clone()));
    let badge = UnreadBadge::mount(&core);
    let mut changes = badge.changes();

    info!("Watching unread notifications of {}", user_id);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let count = *changes.borrow_and_update();
                info!("Unread notifications: {}", count);
            }
            Ok(failure) = failures.recv() => {
                warn!("Unread count refresh failed for {}: {}", failure.user_id, failure.error);
            }
        }
    }

    triggers.stop();
    drop(badge);
    core.dispose();
    observer.cleanup();

    Ok(())
}
