//! # itemsync Protocol
//!
//! Sync protocol types and CBOR codecs for itemsync.
//!
//! This crate provides:
//! - `DataType`, the catalog of syncable item types
//! - `SyncEntity`, the unit of sync, with its type-discriminated specifics
//! - Request and response envelopes (Authenticate, Commit, GetUpdates)
//! - Progress markers and their opaque cursor tokens
//! - CBOR encoding/decoding of every wire message
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod data_type;
mod entity;
mod error;
mod messages;
mod progress;

pub use codec::{from_cbor, to_cbor, Message};
pub use data_type::{summarize_types, DataType, ROOT_ID, TOP_LEVEL_FOLDER_TAG};
pub use entity::{is_root_id, EntitySpecifics, SyncEntity};
pub use error::{CodecError, CodecResult};
pub use messages::{
    AuthenticateMessage, AuthenticateResponse, ClientError, ClientToServerMessage,
    ClientToServerResponse, CommitMessage, CommitResponse, EntryResponse, ErrorCode,
    GetUpdatesMessage, GetUpdatesResponse, GetUpdatesSource, RequestContents, ResponseContents,
    ResponseType,
};
pub use progress::{DataTypeProgressMarker, MarkerPosition, ProgressToken};
