//! User notifications: records, the remote data source contract and its HTTP client.

mod http_source;
mod models;
mod source;

pub use http_source::HttpNotificationSource;
pub use models::{Notification, NotificationFilters, NotificationPage, NotificationType, UserId};
pub use source::{DataSourceError, NotificationDataSource};
