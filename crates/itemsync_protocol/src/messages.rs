//! Request and response envelopes.

use crate::codec::Message;
use crate::data_type::DataType;
use crate::entity::SyncEntity;
use crate::progress::DataTypeProgressMarker;
use serde::{Deserialize, Serialize};

/// A request from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientToServerMessage {
    /// Account name the client believes it is syncing.
    #[serde(default)]
    pub share: String,
    /// Store birthday the client last saw, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_birthday: Option<String>,
    /// The request itself.
    pub contents: RequestContents,
}

impl ClientToServerMessage {
    /// Creates a request without a store birthday.
    pub fn new(contents: RequestContents) -> Self {
        Self {
            share: String::new(),
            store_birthday: None,
            contents,
        }
    }

    /// Sets the store birthday the client last saw.
    pub fn with_store_birthday(mut self, birthday: impl Into<String>) -> Self {
        self.store_birthday = Some(birthday.into());
        self
    }

    /// Returns a short label for the request kind.
    pub fn kind(&self) -> &'static str {
        match self.contents {
            RequestContents::Authenticate(_) => "Authenticate",
            RequestContents::Commit(_) => "Commit",
            RequestContents::GetUpdates(_) => "GetUpdates",
        }
    }
}

impl Message for ClientToServerMessage {}

/// The kinds of request a client can make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestContents {
    /// Authenticate the client.
    Authenticate(AuthenticateMessage),
    /// Commit a batch of entries.
    Commit(CommitMessage),
    /// Fetch changes the client has not seen.
    GetUpdates(GetUpdatesMessage),
}

/// Authenticate request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateMessage {
    /// Authentication token; any value is accepted.
    #[serde(default)]
    pub auth_token: String,
}

/// Commit request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMessage {
    /// Entries to commit, in order.
    pub entries: Vec<SyncEntity>,
    /// Globally unique id of the committing client.
    #[serde(default)]
    pub cache_guid: String,
}

impl CommitMessage {
    /// Creates a commit request.
    pub fn new(entries: Vec<SyncEntity>, cache_guid: impl Into<String>) -> Self {
        Self {
            entries,
            cache_guid: cache_guid.into(),
        }
    }
}

/// Why a client is asking for updates. Only used for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GetUpdatesSource {
    /// Not specified.
    #[default]
    Unknown,
    /// First update after startup.
    FirstUpdate,
    /// A local change triggered the request.
    Local,
    /// A server notification triggered the request.
    Notification,
    /// Periodic poll.
    Periodic,
    /// Continuation of an unfinished sync cycle.
    SyncCycleContinuation,
    /// Brand new client.
    NewClient,
    /// Client changed its set of enabled types.
    Reconfiguration,
    /// Explicit refresh of some types.
    DatatypeRefresh,
}

/// GetUpdates request.
///
/// Cursors are either one progress marker per subscribed type, or one
/// legacy `from_timestamp` applied to every type in `requested_types`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUpdatesMessage {
    /// Per-type cursors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from_progress_marker: Vec<DataTypeProgressMarker>,
    /// Legacy single cursor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_timestamp: Option<i64>,
    /// Types the legacy cursor applies to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested_types: Vec<DataType>,
    /// Why the request was made.
    #[serde(default)]
    pub caller_source: GetUpdatesSource,
    /// Asks for the optional Synced Bookmarks folder on the first bookmark
    /// sync.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub create_mobile_bookmarks_folder: bool,
}

impl GetUpdatesMessage {
    /// Creates a request using per-type progress markers.
    pub fn with_markers(markers: Vec<DataTypeProgressMarker>) -> Self {
        Self {
            from_progress_marker: markers,
            ..Self::default()
        }
    }

    /// Creates a request using the legacy single cursor.
    pub fn legacy(from_timestamp: i64, requested_types: Vec<DataType>) -> Self {
        Self {
            from_timestamp: Some(from_timestamp),
            requested_types,
            ..Self::default()
        }
    }

    /// Sets the flag asking for the Synced Bookmarks folder.
    pub fn with_mobile_bookmarks_folder(mut self) -> Self {
        self.create_mobile_bookmarks_folder = true;
        self
    }
}

/// Outcome of a whole request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The request was processed.
    #[default]
    Success,
    /// The client's store birthday does not match this account; the client
    /// must resync from scratch.
    NotMyBirthday,
    /// The server asks the client to retry later.
    TransientError,
    /// Some types were migrated; the client must resync them.
    MigrationDone,
}

/// An error block the server was told to send to every client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientError {
    /// Numeric error type understood by the client.
    pub error_type: i32,
    /// Numeric action the client should take.
    pub action: i32,
    /// Help URL.
    #[serde(default)]
    pub url: String,
    /// Human-readable description.
    #[serde(default)]
    pub error_description: String,
}

/// A response to a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientToServerResponse {
    /// Outcome of the request.
    pub error_code: ErrorCode,
    /// The account's store birthday, echoed on every response.
    pub store_birthday: String,
    /// Kind-specific payload; absent when the request was aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<ResponseContents>,
    /// Types the client must resync, with `ErrorCode::MigrationDone`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub migrated_data_types: Vec<DataType>,
    /// Induced error block, if one is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ClientError>,
}

impl ClientToServerResponse {
    /// Creates an empty response with the given outcome.
    pub fn new(error_code: ErrorCode, store_birthday: impl Into<String>) -> Self {
        Self {
            error_code,
            store_birthday: store_birthday.into(),
            ..Self::default()
        }
    }

    /// Returns the commit payload, if this is a commit response.
    pub fn commit(&self) -> Option<&CommitResponse> {
        match &self.contents {
            Some(ResponseContents::Commit(commit)) => Some(commit),
            _ => None,
        }
    }

    /// Returns the GetUpdates payload, if this is a GetUpdates response.
    pub fn get_updates(&self) -> Option<&GetUpdatesResponse> {
        match &self.contents {
            Some(ResponseContents::GetUpdates(updates)) => Some(updates),
            _ => None,
        }
    }

    /// Returns the authenticate payload, if this is an authenticate response.
    pub fn authenticate(&self) -> Option<&AuthenticateResponse> {
        match &self.contents {
            Some(ResponseContents::Authenticate(auth)) => Some(auth),
            _ => None,
        }
    }
}

impl Message for ClientToServerResponse {}

/// Kind-specific response payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseContents {
    /// Authenticate response.
    Authenticate(AuthenticateResponse),
    /// Commit response.
    Commit(CommitResponse),
    /// GetUpdates response.
    GetUpdates(GetUpdatesResponse),
}

/// Authenticate response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    /// Account email.
    pub email: String,
    /// Account display name.
    pub display_name: String,
}

/// Per-entry commit outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    /// The entry was committed.
    #[default]
    Success,
    /// The entry was not committed; the client must fetch and retry.
    Conflict,
}

/// Commit response: one entry response per committed entry, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    /// Per-entry outcomes.
    pub entry_responses: Vec<EntryResponse>,
}

/// Outcome of committing one entry.
///
/// On success, carries the values the server is allowed to override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryResponse {
    /// Success or conflict.
    pub response_type: ResponseType,
    /// Final server id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_string: Option<String>,
    /// Final version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Final sibling position; absent for deletions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_in_parent: Option<i64>,
    /// Final name; absent for deletions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Final display name; absent for deletions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_unique_name: Option<String>,
    /// Error text on conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl EntryResponse {
    /// A conflict outcome.
    pub fn conflict() -> Self {
        Self {
            response_type: ResponseType::Conflict,
            error_message: Some("Conflict.".to_string()),
            ..Self::default()
        }
    }

    /// A success outcome describing the stored entity.
    pub fn success(entity: &SyncEntity) -> Self {
        if entity.deleted {
            return Self {
                response_type: ResponseType::Success,
                id_string: Some(entity.id_string.clone()),
                version: Some(entity.version),
                ..Self::default()
            };
        }
        Self {
            response_type: ResponseType::Success,
            id_string: Some(entity.id_string.clone()),
            version: Some(entity.version),
            position_in_parent: entity.position_in_parent,
            name: Some(entity.name.clone()),
            non_unique_name: Some(entity.non_unique_name.clone()),
            error_message: None,
        }
    }

    /// Returns true if the entry was committed.
    pub fn is_success(&self) -> bool {
        self.response_type == ResponseType::Success
    }
}

/// GetUpdates response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUpdatesResponse {
    /// The page of changed entries, oldest first.
    pub entries: Vec<SyncEntity>,
    /// How many changes remain on the server after this page.
    pub changes_remaining: i64,
    /// Updated per-type cursors, when the request used progress markers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_progress_marker: Vec<DataTypeProgressMarker>,
    /// Updated legacy cursor, when the request used one and it advanced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_timestamp: Option<i64>,
}
