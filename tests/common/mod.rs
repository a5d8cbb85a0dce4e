//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{FakeSource, USER_1};
//!
//! #[tokio::test]
//! async fn test_refresh() {
//!     let source = FakeSource::new();
//!     source.set_unread_count(USER_1, 3);
//! }
//! ```

#![allow(dead_code)]

mod backend;
mod fake_source;
mod fixtures;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use backend::StubBackend;
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fake_source::FakeSource;
#[allow(unused_imports)]
pub use fixtures::{make_notification, settle, user};
