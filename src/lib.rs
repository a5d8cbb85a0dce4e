//! Notification Sync Library
//!
//! Keeps the authenticated user's unread notification count consistent across UI consumers,
//! optimistic local updates, server refreshes and connectivity/app-state transitions.

pub mod bindings;
pub mod config;
pub mod connectivity;
mod listeners;
pub mod notifications;
pub mod sync;

// Re-export commonly used types for convenience
pub use bindings::{NotificationsScreen, RefreshTriggerSettings, RefreshTriggers, UnreadBadge};
pub use connectivity::{AppState, ChannelPlatform, ConnectivityObserver, ConnectivityState};
pub use listeners::Subscription;
pub use notifications::{
    DataSourceError, HttpNotificationSource, Notification, NotificationDataSource, UserId,
};
pub use sync::{NotificationSyncCore, RefreshOutcome};
