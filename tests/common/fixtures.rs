//! Test data builders and helpers

use super::constants::MAX_SETTLE_YIELDS;
use notification_sync::notifications::{Notification, NotificationType, UserId};

pub fn user(id: &str) -> UserId {
    UserId::from(id)
}

/// Builds a notification; newer notifications get a larger `created_at`.
pub fn make_notification(id: &str, unread: bool, created_at: i64) -> Notification {
    Notification {
        id: id.to_string(),
        notification_type: NotificationType::Message,
        title: format!("Notification {}", id),
        body: None,
        data: serde_json::json!({ "ref": id }),
        read_at: if unread { None } else { Some(created_at + 10) },
        created_at,
    }
}

/// Yields to the runtime until `condition` holds.
///
/// # Panics
///
/// Panics if the condition is still false after `MAX_SETTLE_YIELDS` yields.
pub async fn settle(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..MAX_SETTLE_YIELDS {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("Condition not reached: {}", what);
}
