//! # itemsync Server
//!
//! Reference sync server for itemsync.
//!
//! This crate provides a single-account, in-memory sync server:
//! - Optimistic-concurrency commits with per-batch tentative id resolution
//! - Subtree-wide soft deletion with permanent tombstones
//! - Sparse sibling ordering from relative "insert after" hints
//! - Per-type incremental change feeds driven by progress markers
//! - Test hooks for migrations, birthday resets and induced errors
//!
//! Transport is left to the embedder: requests arrive as CBOR bytes or as
//! decoded messages.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐                   ┌──────────────────┐
//! │     Client A     │                   │     Client B     │
//! └────────┬─────────┘                   └────────┬─────────┘
//!          │    Commit / GetUpdates (CBOR)         │
//!          └──────────────────┬────────────────────┘
//!                             ▼
//!                  ┌──────────────────────┐
//!                  │      SyncServer      │
//!                  │  ┌────────────────┐  │
//!                  │  │ RequestHandler │  │
//!                  │  └───────┬────────┘  │
//!                  │          ▼ (lock)    │
//!                  │  ┌────────────────┐  │
//!                  │  │  AccountStore  │  │
//!                  │  └────────────────┘  │
//!                  └──────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Non-test code propagates errors instead of panicking.
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod account;
mod config;
mod error;
mod handler;
mod ids;
mod migration;
mod permanent;
mod position;
mod server;
mod sieve;

pub use account::{AccountStore, ChangeBatch, CommitConflict};
pub use config::{ServerConfig, DEFAULT_BATCH_SIZE, DEFAULT_POSITION_GAP};
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use ids::{make_id, CommitSession, IdentifierAssigner, ServerId};
pub use migration::MigrationHistory;
pub use permanent::{PermanentItem, PERMANENT_ITEMS, SYNCED_BOOKMARKS_TAG};
pub use position::{PositionAllocator, PositionHint, Sibling};
pub use server::SyncServer;
pub use sieve::UpdateSieve;
