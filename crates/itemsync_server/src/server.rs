//! Main sync server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use itemsync_protocol::{
    ClientError, ClientToServerMessage, ClientToServerResponse, DataType, Message, SyncEntity,
};
use std::sync::Arc;

/// The sync server.
///
/// This server holds one in-memory account and processes Authenticate,
/// Commit and GetUpdates requests against it. Requests are fully
/// serialized: each one holds the account lock from dispatch until its
/// response is assembled.
///
/// # Example
///
/// ```
/// use itemsync_protocol::{
///     AuthenticateMessage, ClientToServerMessage, ClientToServerResponse, Message,
///     RequestContents,
/// };
/// use itemsync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default());
///
/// let request = ClientToServerMessage::new(RequestContents::Authenticate(
///     AuthenticateMessage::default(),
/// ));
/// let raw = server
///     .handle_command(Some("client-1"), &request.encode().unwrap())
///     .unwrap();
/// let response = ClientToServerResponse::decode(&raw).unwrap();
/// assert_eq!(response.authenticate().unwrap().email, "syncjuser@chromium");
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a new sync server with an empty account.
    pub fn new(config: ServerConfig) -> Self {
        let context = Arc::new(HandlerContext::new(config));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Handles an encoded request and returns the encoded response.
    ///
    /// The request is decoded before the account is touched; a malformed
    /// request never changes state.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRequest`] if the request does not
    /// decode.
    pub fn handle_command(&self, client_id: Option<&str>, raw: &[u8]) -> ServerResult<Vec<u8>> {
        let request = ClientToServerMessage::decode(raw)
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
        let response = self.handle_message(client_id, &request)?;
        Ok(response.encode()?)
    }

    /// Handles a decoded request.
    pub fn handle_message(
        &self,
        client_id: Option<&str>,
        request: &ClientToServerMessage,
    ) -> ServerResult<ClientToServerResponse> {
        self.handler.handle_message(client_id, request)
    }

    /// Migrates the given types. Clients holding cursors or ids from before
    /// the migration are told to resync them.
    pub fn trigger_migration(&self, data_types: &[DataType]) {
        self.context
            .with_account(|account| account.trigger_migration(data_types));
    }

    /// Migrates types given by name, e.g. `"bookmarks"` or `"32904"`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::UnknownDataType`] if a name is not
    /// recognized; nothing is migrated in that case.
    pub fn trigger_migration_by_name<S: AsRef<str>>(&self, names: &[S]) -> ServerResult<Vec<DataType>> {
        let data_types = names
            .iter()
            .map(|name| {
                DataType::from_str_loose(name.as_ref())
                    .ok_or_else(|| ServerError::UnknownDataType(name.as_ref().to_string()))
            })
            .collect::<ServerResult<Vec<_>>>()?;
        self.trigger_migration(&data_types);
        Ok(data_types)
    }

    /// Replaces the store birthday and returns the new one.
    pub fn reset_store_birthday(&self) -> String {
        self.context
            .with_account(|account| account.reset_store_birthday().to_string())
    }

    /// Creates the Synced Bookmarks folder if it does not exist yet.
    pub fn create_synced_bookmarks(&self) {
        self.context
            .with_account(|account| account.create_synced_bookmarks());
    }

    /// Makes every later request fail with a transient error, or stops
    /// doing so.
    pub fn set_transient_error(&self, enabled: bool) {
        self.context.set_transient_error(enabled);
    }

    /// Attaches `error` to every later response. `None` stops it.
    pub fn set_induced_error(&self, error: Option<ClientError>) {
        self.context
            .with_account(|account| account.set_induced_error(error));
    }

    /// Returns the current store birthday.
    pub fn store_birthday(&self) -> String {
        self.context
            .with_account(|account| account.store_birthday().to_string())
    }

    /// Returns the last version handed out.
    pub fn version(&self) -> i64 {
        self.context.with_account(|account| account.version())
    }

    /// Returns the number of stored entities, tombstones included.
    pub fn entity_count(&self) -> usize {
        self.context.with_account(|account| account.len())
    }

    /// Returns a copy of the stored entity with the given id.
    pub fn entity(&self, id: &str) -> Option<SyncEntity> {
        self.context
            .with_account(|account| account.entity(id).cloned())
    }

    /// Returns the id of a permanent folder.
    pub fn permanent_item_id(&self, tag: &str) -> Option<String> {
        self.context
            .with_account(|account| account.permanent_item_id(tag))
    }
}

impl Default for SyncServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}
