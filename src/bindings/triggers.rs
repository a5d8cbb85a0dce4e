//! Refresh policy: decides when the unread count is refreshed.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connectivity::{AppStateTransition, ConnectivityObserver};
use crate::listeners::Subscription;
use crate::sync::NotificationSyncCore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTriggerSettings {
    /// Refresh when the app comes back to the foreground
    pub refresh_on_foreground: bool,
    /// Refresh when connectivity is restored
    pub refresh_on_reconnect: bool,
    /// Periodic refresh while online and in the foreground, `None` to disable
    pub poll_interval: Option<Duration>,
}

impl Default for RefreshTriggerSettings {
    fn default() -> Self {
        Self {
            refresh_on_foreground: true,
            refresh_on_reconnect: true,
            poll_interval: Some(Duration::from_secs(60)),
        }
    }
}

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Wires observer signals (and an optional timer) to [`NotificationSyncCore::spawn_refresh`].
///
/// Triggers stay active until [`stop`](Self::stop) is called or the value is dropped.
pub struct RefreshTriggers {
    subscriptions: Vec<Subscription>,
    poller: Option<Poller>,
}

impl RefreshTriggers {
    pub fn start(
        core: &NotificationSyncCore,
        observer: &ConnectivityObserver,
        settings: &RefreshTriggerSettings,
    ) -> Self {
        let mut subscriptions = Vec::new();

        if settings.refresh_on_foreground {
            let core = core.clone();
            subscriptions.push(observer.on_app_state_change(Arc::new(
                move |transition: AppStateTransition| {
                    if transition.became_active() {
                        debug!("App became active, refreshing unread count");
                        core.spawn_refresh();
                    }
                },
            )));
        }

        if settings.refresh_on_reconnect {
            let core = core.clone();
            subscriptions.push(observer.on_connectivity_change(Arc::new(
                move |is_connected: bool| {
                    if is_connected {
                        debug!("Connectivity restored, refreshing unread count");
                        core.spawn_refresh();
                    }
                },
            )));
        }

        let poller = settings
            .poll_interval
            .filter(|interval| !interval.is_zero())
            .and_then(|interval| spawn_poller(core.clone(), observer.clone(), interval));

        Self {
            subscriptions,
            poller,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Detach every trigger. Idempotent.
    pub fn stop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        if let Some(poller) = self.poller.take() {
            poller.cancel.cancel();
            poller.handle.abort();
            debug!("Unread count poller stopped");
        }
    }
}

impl Drop for RefreshTriggers {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_poller(
    core: NotificationSyncCore,
    observer: ConnectivityObserver,
    interval: Duration,
) -> Option<Poller> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("No tokio runtime available, periodic unread count refresh disabled");
        return None;
    };

    info!("Refreshing unread count every {:?}", interval);
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle = runtime.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if !observer.is_connected() || !observer.is_app_active() {
                        debug!("Offline or in background, skipping periodic refresh");
                        continue;
                    }
                    core.refresh().await;
                }
            }
        }
    });

    Some(Poller { cancel, handle })
}
