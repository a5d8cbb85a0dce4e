//! In-memory notification data source
//!
//! Answers immediately from an in-memory store by default. In gated mode every unread
//! count request stays pending until the test resolves it, which lets tests interleave
//! refreshes with identity changes and local deltas.

use async_trait::async_trait;
use notification_sync::notifications::{
    DataSourceError, Notification, NotificationDataSource, NotificationFilters, NotificationPage,
    UserId,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use super::fixtures::settle;

type CountResponder = oneshot::Sender<Result<u64, DataSourceError>>;

#[derive(Default)]
struct FakeState {
    gated: bool,
    pending: VecDeque<(UserId, CountResponder)>,
    /// user -> notifications, newest first
    notifications: HashMap<UserId, Vec<Notification>>,
    count_overrides: HashMap<UserId, u64>,
    next_count_error: Option<DataSourceError>,
    next_list_error: Option<DataSourceError>,
    /// The next list request waits until this resolves or its sender is dropped
    list_hold: Option<oneshot::Receiver<()>>,
    /// Page number reported back instead of the requested one
    echoed_page: Option<u32>,
}

#[derive(Default)]
pub struct FakeSource {
    state: Mutex<FakeState>,
    count_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FakeSource {
    /// Source answering every request right away.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Source whose unread count requests wait for `resolve_next`.
    pub fn gated() -> Arc<Self> {
        let source = Self::default();
        source.state.lock().unwrap().gated = true;
        Arc::new(source)
    }

    pub fn set_unread_count(&self, user_id: &str, count: u64) {
        self.state
            .lock()
            .unwrap()
            .count_overrides
            .insert(UserId::from(user_id), count);
    }

    pub fn add_notifications(&self, user_id: &str, notifications: Vec<Notification>) {
        let mut state = self.state.lock().unwrap();
        let list = state
            .notifications
            .entry(UserId::from(user_id))
            .or_default();
        list.extend(notifications);
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    pub fn fail_next_count(&self, error: DataSourceError) {
        self.state.lock().unwrap().next_count_error = Some(error);
    }

    pub fn fail_next_list(&self, error: DataSourceError) {
        self.state.lock().unwrap().next_list_error = Some(error);
    }

    /// Hold the next list request until the returned sender fires or is dropped.
    pub fn hold_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().unwrap().list_hold = Some(rx);
        tx
    }

    /// Report `page` in every list response, whatever was requested.
    pub fn echo_page(&self, page: u32) {
        self.state.lock().unwrap().echoed_page = Some(page);
    }

    /// Number of unread count requests received so far.
    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn pending_requests(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Wait until at least `expected` unread count requests are pending.
    pub async fn wait_for_pending(&self, expected: usize) {
        settle("pending unread count requests", || {
            self.pending_requests() >= expected
        })
        .await;
    }

    /// Answer the oldest pending unread count request. Returns the user it was for.
    ///
    /// # Panics
    ///
    /// Panics if no request is pending.
    pub fn resolve_next(&self, result: Result<u64, DataSourceError>) -> UserId {
        let (user_id, responder) = self
            .state
            .lock()
            .unwrap()
            .pending
            .pop_front()
            .expect("No pending unread count request");
        let _ = responder.send(result);
        user_id
    }

    /// Answer the oldest pending request issued for `user_id`.
    pub fn resolve_for(&self, user_id: &str, result: Result<u64, DataSourceError>) {
        let mut state = self.state.lock().unwrap();
        let index = state
            .pending
            .iter()
            .position(|(pending_user, _)| pending_user.as_str() == user_id)
            .unwrap_or_else(|| panic!("No pending request for {}", user_id));
        let (_, responder) = state.pending.remove(index).unwrap();
        let _ = responder.send(result);
    }

    fn unread_in_store(state: &FakeState, user_id: &UserId) -> u64 {
        state
            .notifications
            .get(user_id)
            .map(|list| list.iter().filter(|n| n.is_unread()).count() as u64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl NotificationDataSource for FakeSource {
    async fn get_unread_count(&self, user_id: &UserId) -> Result<u64, DataSourceError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);

        let rx = {
            let mut state = self.state.lock().unwrap();
            if let Some(error) = state.next_count_error.take() {
                return Err(error);
            }
            if !state.gated {
                let count = state
                    .count_overrides
                    .get(user_id)
                    .copied()
                    .unwrap_or_else(|| Self::unread_in_store(&state, user_id));
                return Ok(count);
            }
            let (tx, rx) = oneshot::channel();
            state.pending.push_back((user_id.clone(), tx));
            rx
        };

        rx.await
            .unwrap_or_else(|_| Err(DataSourceError::Transport("request dropped".into())))
    }

    async fn get_user_notifications(
        &self,
        user_id: &UserId,
        page: u32,
        page_size: u32,
        filters: &NotificationFilters,
    ) -> Result<NotificationPage, DataSourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let hold = {
            let mut state = self.state.lock().unwrap();
            if let Some(error) = state.next_list_error.take() {
                return Err(error);
            }
            state.list_hold.take()
        };
        if let Some(hold) = hold {
            let _ = hold.await;
        }

        let state = self.state.lock().unwrap();

        let matching: Vec<Notification> = state
            .notifications
            .get(user_id)
            .map(|list| {
                list.iter()
                    .filter(|n| !filters.unread_only || n.is_unread())
                    .filter(|n| {
                        filters
                            .notification_type
                            .map_or(true, |t| n.notification_type == t)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let start = (page as usize) * (page_size as usize);
        let data = matching
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();

        Ok(NotificationPage {
            data,
            total: matching.len() as u64,
            page: state.echoed_page.unwrap_or(page),
            page_size,
        })
    }

    async fn mark_as_read(&self, notification_id: &str) -> Result<bool, DataSourceError> {
        let mut state = self.state.lock().unwrap();
        let notification = state
            .notifications
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|n| n.id == notification_id)
            .ok_or_else(|| DataSourceError::NotFound(notification_id.to_string()))?;

        if notification.read_at.is_some() {
            return Ok(false);
        }
        notification.read_at = Some(notification.created_at + 1);
        Ok(true)
    }

    async fn mark_all_as_read(&self, user_id: &UserId) -> Result<u64, DataSourceError> {
        let mut state = self.state.lock().unwrap();
        state.count_overrides.remove(user_id);
        let mut updated = 0;
        if let Some(list) = state.notifications.get_mut(user_id) {
            for notification in list.iter_mut().filter(|n| n.read_at.is_none()) {
                notification.read_at = Some(notification.created_at + 1);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_notification(&self, notification_id: &str) -> Result<bool, DataSourceError> {
        let mut state = self.state.lock().unwrap();
        for list in state.notifications.values_mut() {
            if let Some(index) = list.iter().position(|n| n.id == notification_id) {
                list.remove(index);
                return Ok(true);
            }
        }
        Ok(false)
    }
}
