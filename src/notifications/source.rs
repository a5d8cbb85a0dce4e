//! Contract of the remote notification backend.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{NotificationFilters, NotificationPage, UserId};

/// Errors returned by a notification data source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The backend answered 404 for this notification or path.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl DataSourceError {
    /// Whether repeating the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DataSourceError::Transport(_) => true,
            DataSourceError::Status { status, .. } => *status >= 500 || *status == 429,
            DataSourceError::Malformed(_) | DataSourceError::NotFound(_) => false,
        }
    }
}

/// Remote source of truth for a user's notifications.
///
/// The sync core only calls [`get_unread_count`](Self::get_unread_count); the rest is
/// used by screen bindings.
#[async_trait]
pub trait NotificationDataSource: Send + Sync {
    /// Number of notifications of `user_id` with no read timestamp.
    async fn get_unread_count(&self, user_id: &UserId) -> Result<u64, DataSourceError>;

    /// One page of the user's notifications, newest first.
    async fn get_user_notifications(
        &self,
        user_id: &UserId,
        page: u32,
        page_size: u32,
        filters: &NotificationFilters,
    ) -> Result<NotificationPage, DataSourceError>;

    /// Mark a single notification as read. Returns whether a record was updated.
    async fn mark_as_read(&self, notification_id: &str) -> Result<bool, DataSourceError>;

    /// Mark every notification of the user as read. Returns how many were updated.
    async fn mark_all_as_read(&self, user_id: &UserId) -> Result<u64, DataSourceError>;

    /// Delete a notification. Returns whether a record was deleted.
    async fn delete_notification(&self, notification_id: &str) -> Result<bool, DataSourceError>;
}
