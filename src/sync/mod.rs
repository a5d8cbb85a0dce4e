//! Unread notification count synchronization.
//!
//! [`NotificationSyncCore`] caches the count for the active user, fans changes out to
//! subscribers and coalesces refreshes against the [`NotificationDataSource`].
//!
//! [`NotificationDataSource`]: crate::notifications::NotificationDataSource

mod engine;

pub use self::engine::{NotificationSyncCore, RefreshFailure, RefreshOutcome, UnreadCallback};
