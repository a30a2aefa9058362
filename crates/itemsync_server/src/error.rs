//! Error types for the sync server.

use itemsync_protocol::{ClientError, CodecError, DataType};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
///
/// Some variants abort a request but still produce a normal response
/// envelope carrying an error code; see [`ServerError::is_protocol_abort`].
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A message could not be decoded or encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A data type name that is not in the catalog.
    #[error("unrecognized data type: {0}")]
    UnknownDataType(String),

    /// The client's store birthday belongs to another account.
    #[error("store birthday mismatch")]
    NotMyBirthday,

    /// The server was told to answer with a transient error.
    #[error("transient error")]
    TransientError,

    /// The request touches types migrated since the client last synced.
    #[error("migration done for {data_types:?}")]
    MigrationDone {
        /// Types the client must resync.
        data_types: Vec<DataType>,
    },

    /// The server was told to answer every request with this error.
    #[error("induced error {}", .0.error_type)]
    InducedError(Box<ClientError>),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::Codec(_)
                | ServerError::UnknownDataType(_)
        )
    }

    /// Returns true if this error is reported inside a regular response
    /// envelope rather than rejecting the request.
    pub fn is_protocol_abort(&self) -> bool {
        matches!(
            self,
            ServerError::NotMyBirthday
                | ServerError::TransientError
                | ServerError::MigrationDone { .. }
                | ServerError::InducedError(_)
        )
    }
}
