//! Notification data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Notification type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    System,
    Message,
    Reminder,
    Alert,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::System => "system",
            NotificationType::Message => "message",
            NotificationType::Reminder => "reminder",
            NotificationType::Alert => "alert",
        }
    }
}

/// A user notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub read_at: Option<i64>,
    pub created_at: i64,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

/// Filters for listing a user's notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilters {
    /// Only return notifications without a read timestamp
    pub unread_only: bool,
    /// Restrict to a single notification type
    pub notification_type: Option<NotificationType>,
}

/// One page of a user's notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPage {
    pub data: Vec<Notification>,
    /// Total number of notifications matching the filters, across all pages
    pub total: u64,
    /// Zero-based page index
    pub page: u32,
    pub page_size: u32,
}

impl NotificationPage {
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            page,
            page_size,
        }
    }

    /// Whether pages after this one hold more notifications.
    pub fn has_more(&self) -> bool {
        let seen = (self.page as u64 + 1) * self.page_size as u64;
        seen < self.total
    }
}
