//! Request handlers for the sync endpoints.

use crate::account::AccountStore;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::ids::CommitSession;
use crate::sieve::UpdateSieve;
use itemsync_protocol::{
    AuthenticateMessage, AuthenticateResponse, ClientToServerMessage, ClientToServerResponse,
    CommitMessage, CommitResponse, EntryResponse, ErrorCode, GetUpdatesMessage,
    GetUpdatesResponse, RequestContents, ResponseContents,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Short names for clients, used only to make logs readable.
///
/// Clients are named `A` to `Y` in order of first appearance, then `+A`,
/// `+B` and so on.
#[derive(Debug, Default)]
struct ClientNicknames {
    names: HashMap<String, String>,
}

impl ClientNicknames {
    fn get(&mut self, client_id: Option<&str>) -> String {
        let Some(client_id) = client_id else {
            return "?".to_string();
        };
        let next = self.names.len();
        self.names
            .entry(client_id.to_string())
            .or_insert_with(|| nickname(next))
            .clone()
    }
}

fn nickname(index: usize) -> String {
    const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXY";
    let letter = char::from(LETTERS[index % LETTERS.len()]);
    format!("{}{letter}", "+".repeat(index / LETTERS.len()))
}

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// The account. Held for the whole of a request.
    account: Mutex<AccountStore>,
    clients: Mutex<ClientNicknames>,
    transient_error: AtomicBool,
}

impl HandlerContext {
    /// Creates a new handler context with an empty account.
    pub fn new(config: ServerConfig) -> Self {
        let account = AccountStore::from_config(&config);
        Self {
            config,
            account: Mutex::new(account),
            clients: Mutex::new(ClientNicknames::default()),
            transient_error: AtomicBool::new(false),
        }
    }

    /// Runs `f` with exclusive access to the account.
    pub fn with_account<T>(&self, f: impl FnOnce(&mut AccountStore) -> T) -> T {
        f(&mut self.account.lock())
    }

    /// Makes every later request fail with a transient error.
    pub fn set_transient_error(&self, enabled: bool) {
        self.transient_error.store(enabled, Ordering::SeqCst);
    }

    fn nickname(&self, client_id: Option<&str>) -> String {
        self.clients.lock().get(client_id)
    }
}

/// Handler for sync requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a decoded request.
    ///
    /// Birthday mismatches, transient and induced errors, and migrations
    /// are reported inside the returned envelope. Only invalid requests
    /// are returned as errors.
    pub fn handle_message(
        &self,
        client_id: Option<&str>,
        request: &ClientToServerMessage,
    ) -> ServerResult<ClientToServerResponse> {
        let nickname = self.context.nickname(client_id);
        debug!(client = %nickname, kind = request.kind(), "request");
        let mut account = self.context.account.lock();

        let outcome = self.dispatch(&mut account, &nickname, request);
        let mut response = ClientToServerResponse::new(ErrorCode::Success, account.store_birthday());
        match outcome {
            Ok(contents) => response.contents = Some(contents),
            Err(ServerError::NotMyBirthday) => {
                warn!(client = %nickname, "store birthday mismatch");
                response.error_code = ErrorCode::NotMyBirthday;
            }
            Err(ServerError::TransientError) => {
                response.error_code = ErrorCode::TransientError;
            }
            Err(ServerError::MigrationDone { data_types }) => {
                warn!(client = %nickname, ?data_types, "client must resync migrated types");
                response.error_code = ErrorCode::MigrationDone;
                response.migrated_data_types = data_types;
            }
            Err(ServerError::InducedError(error)) => {
                response.error = Some(*error);
            }
            Err(other) => {
                warn!(client = %nickname, error = %other, "rejecting {} request", request.kind());
                return Err(other);
            }
        }
        Ok(response)
    }

    fn dispatch(
        &self,
        account: &mut AccountStore,
        nickname: &str,
        request: &ClientToServerMessage,
    ) -> ServerResult<ResponseContents> {
        if let Some(birthday) = request.store_birthday.as_deref() {
            if birthday != account.store_birthday() {
                return Err(ServerError::NotMyBirthday);
            }
        }
        if self.context.transient_error.load(Ordering::SeqCst) {
            return Err(ServerError::TransientError);
        }
        if let Some(error) = account.induced_error() {
            return Err(ServerError::InducedError(Box::new(error.clone())));
        }

        match &request.contents {
            RequestContents::Authenticate(message) => Ok(ResponseContents::Authenticate(
                self.handle_authenticate(message),
            )),
            RequestContents::Commit(message) => self
                .handle_commit(account, nickname, message)
                .map(ResponseContents::Commit),
            RequestContents::GetUpdates(message) => self
                .handle_get_updates(account, nickname, message)
                .map(ResponseContents::GetUpdates),
        }
    }

    /// Handles an authenticate request. Every token is accepted.
    pub fn handle_authenticate(&self, _request: &AuthenticateMessage) -> AuthenticateResponse {
        AuthenticateResponse {
            email: self.context.config.user_email.clone(),
            display_name: self.context.config.user_display_name.clone(),
        }
    }

    /// Handles a commit request.
    ///
    /// Entries are committed in order. After the first conflict, the rest
    /// of the batch is reported as conflicting without being attempted.
    pub fn handle_commit(
        &self,
        account: &mut AccountStore,
        nickname: &str,
        request: &CommitMessage,
    ) -> ServerResult<CommitResponse> {
        account.validate_commit_entries(&request.entries)?;

        let mut session = CommitSession::new();
        let mut response = CommitResponse::default();
        let mut batch_failed = false;
        for entry in &request.entries {
            if batch_failed {
                response.entry_responses.push(EntryResponse::conflict());
                continue;
            }
            match account.commit_entry(entry, &request.cache_guid, &mut session) {
                Ok(stored) => response.entry_responses.push(EntryResponse::success(&stored)),
                Err(conflict) => {
                    warn!(client = %nickname, id = %entry.id_string, %conflict, "commit conflict");
                    batch_failed = true;
                    response.entry_responses.push(EntryResponse::conflict());
                }
            }
        }

        let committed = response
            .entry_responses
            .iter()
            .filter(|r| r.is_success())
            .count();
        debug!(
            client = %nickname,
            committed,
            total = request.entries.len(),
            version = account.version(),
            "commit"
        );
        Ok(response)
    }

    /// Handles a GetUpdates request.
    pub fn handle_get_updates(
        &self,
        account: &mut AccountStore,
        nickname: &str,
        request: &GetUpdatesMessage,
    ) -> ServerResult<GetUpdatesResponse> {
        let sieve = UpdateSieve::new(request)?;
        debug!(
            client = %nickname,
            source = ?request.caller_source,
            wants = %sieve.summarize(),
            "get updates"
        );
        sieve.check_migration_state(account.migration_history())?;

        let batch = account.get_changes(&sieve);
        let mut response = GetUpdatesResponse {
            entries: batch.entries,
            changes_remaining: batch.changes_remaining,
            ..GetUpdatesResponse::default()
        };
        sieve.save_progress(batch.new_timestamp, account.migration_history(), &mut response)?;

        debug!(
            client = %nickname,
            sent = response.entries.len(),
            remaining = response.changes_remaining,
            cursor = batch.new_timestamp,
            "get updates done"
        );
        Ok(response)
    }
}
