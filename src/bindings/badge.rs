//! Badge binding: one UI element showing the unread count.

use tokio::sync::watch;

use crate::listeners::Subscription;
use crate::sync::{NotificationSyncCore, RefreshOutcome};

/// Mirrors the core's unread count into a `watch` channel for a render loop.
///
/// Dropping the badge unsubscribes it from the core.
pub struct UnreadBadge {
    core: NotificationSyncCore,
    count: watch::Receiver<u64>,
    subscription: Subscription,
}

impl UnreadBadge {
    /// Subscribe to the core. Requests a background refresh when nothing was loaded yet.
    pub fn mount(core: &NotificationSyncCore) -> Self {
        let (sender, count) = watch::channel(core.unread_count());

        let reader = core.clone();
        let subscription = core.subscribe_fn(move || {
            let latest = reader.unread_count();
            sender.send_if_modified(|current| {
                if *current == latest {
                    return false;
                }
                *current = latest;
                true
            });
        });

        if core.identity().is_some() && !core.has_loaded() {
            core.spawn_refresh();
        }

        Self {
            core: core.clone(),
            count,
            subscription,
        }
    }

    /// Last count delivered to this badge.
    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }

    /// Receiver that wakes whenever the count changes.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.count.clone()
    }

    /// Text to render on the badge, `None` when there is nothing unread.
    ///
    /// Counts above `cap` render as `"{cap}+"`.
    pub fn label(&self, cap: u64) -> Option<String> {
        match self.count() {
            0 => None,
            n if n > cap => Some(format!("{}+", cap)),
            n => Some(n.to_string()),
        }
    }

    /// Manual refresh, e.g. on tap.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.core.refresh().await
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_active()
    }

    /// Detach from the core; same as dropping the badge.
    pub fn unmount(&self) {
        self.subscription.unsubscribe();
    }
}
