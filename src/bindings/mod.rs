//! Glue between the sync core and UI consumers.
//!
//! Bindings decide *when* to refresh and *which* local deltas to apply; the core only
//! provides the primitives.

mod badge;
mod screen;
mod triggers;

pub use badge::UnreadBadge;
pub use screen::NotificationsScreen;
pub use triggers::{RefreshTriggerSettings, RefreshTriggers};
