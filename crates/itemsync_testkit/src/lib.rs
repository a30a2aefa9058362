//! # itemsync Testkit
//!
//! Test utilities for itemsync.
//!
//! This crate provides:
//! - Entity builders and request fixtures
//! - A client-side cursor tracker for multi-request scenarios
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use itemsync_testkit::prelude::*;
//!
//! #[test]
//! fn commit_a_bookmark() {
//!     let mut client = TestClient::new("guid");
//!     let request = client.commit(vec![bookmark("-1", "0")]);
//!     // ... hand `request` to a server
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
