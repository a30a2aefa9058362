//! Per-type progress markers.
//!
//! A progress marker is the cursor a client presents to resume incremental
//! sync of one data type. Its token is opaque to the client; the server
//! packs the last version the client has seen together with the migration
//! version the client synced under.

use crate::codec::{from_cbor, to_cbor};
use crate::data_type::DataType;
use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};

/// The decoded content of a progress marker token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressToken {
    /// Last version the client has seen for the type.
    pub timestamp: i64,
    /// Migration version of the type when the token was issued.
    pub migration_version: i64,
}

impl ProgressToken {
    /// Creates a new token.
    pub fn new(timestamp: i64, migration_version: i64) -> Self {
        Self {
            timestamp,
            migration_version,
        }
    }

    /// Encodes to opaque token bytes.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(&(self.timestamp, self.migration_version))
    }

    /// Decodes from opaque token bytes.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (timestamp, migration_version): (i64, i64) = from_cbor(bytes)?;
        Ok(Self::new(timestamp, migration_version))
    }
}

/// A cursor for one data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTypeProgressMarker {
    /// The type this marker tracks.
    pub data_type: DataType,
    /// Opaque token; present but empty means "from the beginning".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Vec<u8>>,
    /// Legacy timestamp, sent by clients upgrading from the single
    /// legacy cursor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_token_for_migration: Option<i64>,
}

/// Where a progress marker says the client is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPosition {
    /// Last version seen.
    pub timestamp: i64,
    /// Migration version to validate, if the marker carries one.
    pub migration_version: Option<i64>,
}

impl DataTypeProgressMarker {
    /// A marker that requests everything from the beginning.
    pub fn initial(data_type: DataType) -> Self {
        Self {
            data_type,
            token: Some(Vec::new()),
            timestamp_token_for_migration: None,
        }
    }

    /// A marker carrying a token for `timestamp` under `migration_version`.
    pub fn at(data_type: DataType, timestamp: i64, migration_version: i64) -> CodecResult<Self> {
        Ok(Self {
            data_type,
            token: Some(ProgressToken::new(timestamp, migration_version).encode()?),
            timestamp_token_for_migration: None,
        })
    }

    /// Interprets the marker.
    ///
    /// # Errors
    ///
    /// Fails if the marker has neither a token nor a legacy timestamp, or
    /// if the token does not decode.
    pub fn position(&self) -> CodecResult<MarkerPosition> {
        if let Some(timestamp) = self.timestamp_token_for_migration {
            return Ok(MarkerPosition {
                timestamp,
                migration_version: (timestamp != 0).then_some(1),
            });
        }
        match self.token.as_deref() {
            Some([]) => Ok(MarkerPosition {
                timestamp: 0,
                migration_version: None,
            }),
            Some(bytes) => {
                let token = ProgressToken::decode(bytes)?;
                Ok(MarkerPosition {
                    timestamp: token.timestamp,
                    migration_version: Some(token.migration_version),
                })
            }
            None => Err(CodecError::invalid_structure(
                "no timestamp information in progress marker",
            )),
        }
    }
}
