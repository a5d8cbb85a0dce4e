//! Notifications screen binding.
//!
//! Holds the screen-only state (the paginated list and its loading flag) and turns
//! successful mutations into local deltas on the shared core.

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::listeners::lock;
use crate::notifications::{
    DataSourceError, Notification, NotificationDataSource, NotificationFilters, UserId,
};
use crate::sync::{NotificationSyncCore, RefreshOutcome};

#[derive(Default)]
struct ScreenState {
    /// Identity the list was loaded for
    owner: Option<UserId>,
    notifications: Vec<Notification>,
    next_page: u32,
    has_more: bool,
    total: u64,
    loading: bool,
    /// Bumped by every load and filter change; a page stamped with an older value is dropped
    generation: u64,
}

/// Clears the loading flag when a load ends, including when its future is dropped.
struct LoadGuard<'a> {
    state: &'a Mutex<ScreenState>,
    generation: u64,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        if state.generation == self.generation {
            state.loading = false;
        }
    }
}

pub struct NotificationsScreen {
    core: NotificationSyncCore,
    data_source: Arc<dyn NotificationDataSource>,
    page_size: u32,
    filters: Mutex<NotificationFilters>,
    state: Mutex<ScreenState>,
}

impl NotificationsScreen {
    pub fn new(
        core: NotificationSyncCore,
        data_source: Arc<dyn NotificationDataSource>,
        page_size: u32,
    ) -> Self {
        Self {
            core,
            data_source,
            page_size: page_size.max(1),
            filters: Mutex::new(NotificationFilters::default()),
            state: Mutex::new(ScreenState::default()),
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.state).notifications.clone()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).loading
    }

    pub fn has_more(&self) -> bool {
        lock(&self.state).has_more
    }

    /// Total number of notifications matching the current filters.
    pub fn total(&self) -> u64 {
        lock(&self.state).total
    }

    pub fn filters(&self) -> NotificationFilters {
        lock(&self.filters).clone()
    }

    /// Replace the filters. The list is cleared; call [`load_first_page`](Self::load_first_page).
    ///
    /// A page still loading with the previous filters is discarded when it arrives.
    pub fn set_filters(&self, filters: NotificationFilters) {
        *lock(&self.filters) = filters;
        let mut state = lock(&self.state);
        state.notifications.clear();
        state.next_page = 0;
        state.has_more = false;
        state.total = 0;
        state.loading = false;
        state.generation += 1;
    }

    /// Replace the list with the first page.
    pub async fn load_first_page(&self) -> Result<(), DataSourceError> {
        self.load_page(true).await
    }

    /// Append the next page, if any.
    pub async fn load_more(&self) -> Result<(), DataSourceError> {
        if !self.has_more() {
            return Ok(());
        }
        self.load_page(false).await
    }

    /// Reload the list and the unread count together.
    ///
    /// Unlike badge refreshes, failures are returned so the screen can report them.
    pub async fn pull_to_refresh(&self) -> Result<RefreshOutcome, DataSourceError> {
        let (list, count) = futures::join!(self.load_page(true), self.core.refresh());
        list?;
        match count {
            RefreshOutcome::Failed(error) => Err(error),
            outcome => Ok(outcome),
        }
    }

    /// Mark one notification as read; the badge drops by one when it was unread.
    pub async fn mark_as_read(&self, notification_id: &str) -> Result<bool, DataSourceError> {
        let updated = self.data_source.mark_as_read(notification_id).await?;
        if !updated {
            debug!("Notification {} was already read", notification_id);
            return Ok(false);
        }

        let was_unread = {
            let mut state = lock(&self.state);
            match state
                .notifications
                .iter_mut()
                .find(|n| n.id == notification_id)
            {
                Some(notification) => {
                    let was_unread = notification.is_unread();
                    notification.read_at = Some(chrono::Utc::now().timestamp());
                    was_unread
                }
                // Not on screen: the backend reported an update, so it was unread
                None => true,
            }
        };

        if was_unread {
            self.core.apply_local_delta(-1);
        }
        Ok(true)
    }

    /// Mark everything as read; the badge drops to zero.
    pub async fn mark_all_as_read(&self) -> Result<u64, DataSourceError> {
        let Some(user_id) = self.core.identity() else {
            return Ok(0);
        };

        let updated = self.data_source.mark_all_as_read(&user_id).await?;

        let now = chrono::Utc::now().timestamp();
        for notification in lock(&self.state).notifications.iter_mut() {
            notification.read_at.get_or_insert(now);
        }

        let current = self.core.unread_count();
        self.core
            .apply_local_delta(-(i64::try_from(current).unwrap_or(i64::MAX)));

        info!("Marked {} notifications as read for {}", updated, user_id);
        Ok(updated)
    }

    /// Delete a notification; the badge drops by one when it was unread.
    pub async fn delete(&self, notification_id: &str) -> Result<bool, DataSourceError> {
        let deleted = self
            .data_source
            .delete_notification(notification_id)
            .await?;
        if !deleted {
            return Ok(false);
        }

        let removed = {
            let mut state = lock(&self.state);
            let position = state
                .notifications
                .iter()
                .position(|n| n.id == notification_id);
            position.map(|index| {
                state.total = state.total.saturating_sub(1);
                state.notifications.remove(index)
            })
        };

        match removed {
            Some(notification) if notification.is_unread() => self.core.apply_local_delta(-1),
            Some(_) => {}
            // Unknown read state, let the server decide
            None => {
                self.core.spawn_refresh();
            }
        }
        Ok(true)
    }

    async fn load_page(&self, first: bool) -> Result<(), DataSourceError> {
        let Some(user_id) = self.core.identity() else {
            let mut state = lock(&self.state);
            let generation = state.generation + 1;
            *state = ScreenState {
                generation,
                ..Default::default()
            };
            return Ok(());
        };

        let (page, generation) = {
            let mut state = lock(&self.state);
            if state.loading {
                debug!("Notifications page already loading");
                return Ok(());
            }
            state.loading = true;
            state.generation += 1;
            let page = if first { 0 } else { state.next_page };
            (page, state.generation)
        };
        let guard = LoadGuard {
            state: &self.state,
            generation,
        };
        let filters = self.filters();

        let result = self
            .data_source
            .get_user_notifications(&user_id, page, self.page_size, &filters)
            .await;
        drop(guard);
        let mut page_data = result?;

        let mut state = lock(&self.state);
        if state.generation != generation {
            debug!("Filters changed while loading notifications, dropping page");
            return Ok(());
        }
        if self.core.identity().as_ref() != Some(&user_id) {
            debug!("Identity changed while loading notifications, dropping page");
            return Ok(());
        }

        if first || state.owner.as_ref() != Some(&user_id) {
            state.notifications.clear();
        }
        state.owner = Some(user_id);
        state.total = page_data.total;
        // The requested page decides where to continue, whatever the backend echoes
        page_data.page = page;
        match page.checked_add(1) {
            Some(next_page) => {
                state.next_page = next_page;
                state.has_more = page_data.has_more();
            }
            None => state.has_more = false,
        }
        state.notifications.extend(page_data.data);
        Ok(())
    }
}
