//! Server id minting and rewriting.
//!
//! A server id has the form `<type>^<migration version>^<inner>` where
//! `<type>` is the protocol field number of the item's type (`0` for the
//! top-level type) and `<inner>` is derived from what identifies the item:
//!
//! - `<server tag>TAG` for permanent items
//! - `<client tag>TAG` for items with a client-defined unique tag
//! - `<server ID originally>CACHE_GUID/CLIENT_ITEM_ID` for everything else
//!
//! Ids are therefore deterministic: the same tag always maps to the same
//! id under a given migration version.

use crate::migration::MigrationHistory;
use crate::permanent;
use itemsync_protocol::{is_root_id, DataType, SyncEntity};
use std::collections::HashMap;

const SEPARATOR: char = '^';

/// A parsed server id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerId<'a> {
    /// Type encoded in the id.
    pub data_type: DataType,
    /// Migration version the id was minted under.
    pub migration_version: i64,
    /// Type-independent part of the id.
    pub inner: &'a str,
}

impl<'a> ServerId<'a> {
    /// Parses a server id. Returns `None` for anything else, including
    /// client-tentative ids and the root sentinel.
    pub fn parse(id: &'a str) -> Option<Self> {
        let mut parts = id.splitn(3, SEPARATOR);
        let type_number: u32 = parts.next()?.parse().ok()?;
        let migration_version: i64 = parts.next()?.parse().ok()?;
        let inner = parts.next()?;
        let data_type = match type_number {
            0 => DataType::TopLevel,
            other => DataType::from_protocol_id(other)?,
        };
        Some(Self {
            data_type,
            migration_version,
            inner,
        })
    }
}

/// Builds an id from its parts.
pub fn make_id(data_type: DataType, migration_version: i64, inner: &str) -> String {
    format!(
        "{}{SEPARATOR}{migration_version}{SEPARATOR}{inner}",
        u32::from(data_type)
    )
}

/// Maps client-tentative ids to server ids within one commit request.
///
/// Later entries of the same request may refer to earlier ones by their
/// tentative ids, as parent or as ordering hint.
#[derive(Debug, Default)]
pub struct CommitSession {
    assigned: HashMap<String, String>,
}

impl CommitSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the server id assigned to a tentative id.
    pub fn resolve(&self, tentative_id: &str) -> Option<&str> {
        self.assigned.get(tentative_id).map(String::as_str)
    }

    fn record(&mut self, tentative_id: String, server_id: String) {
        self.assigned.insert(tentative_id, server_id);
    }
}

/// Mints server ids under the current migration versions.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierAssigner<'a> {
    history: &'a MigrationHistory,
}

impl<'a> IdentifierAssigner<'a> {
    /// Creates an assigner reading versions from `history`.
    pub fn new(history: &'a MigrationHistory) -> Self {
        Self { history }
    }

    fn current_id(&self, data_type: DataType, inner: &str) -> String {
        make_id(data_type, self.history.latest(data_type), inner)
    }

    /// Returns the id of a permanent item. The root sentinel maps to itself.
    ///
    /// Returns `None` for tags outside the permanent catalog.
    pub fn server_tag_id(&self, tag: &str) -> Option<String> {
        if is_root_id(tag) {
            return Some(tag.to_string());
        }
        let item = permanent::find(tag)?;
        Some(self.current_id(item.data_type, &format!("<server tag>{tag}")))
    }

    /// Returns the id of the root folder of `data_type`.
    pub fn type_root_id(&self, data_type: DataType) -> Option<String> {
        let root = permanent::type_root(data_type)?;
        self.server_tag_id(root.tag)
    }

    /// Returns the id of an item with a client-defined unique tag.
    pub fn client_tag_id(&self, data_type: DataType, tag: &str) -> String {
        self.current_id(data_type, &format!("<client tag>{tag}"))
    }

    /// Returns the id of an item without tags.
    pub fn client_item_id(&self, data_type: DataType, cache_guid: &str, item_id: &str) -> String {
        self.current_id(
            data_type,
            &format!("<server ID originally>{cache_guid}/{item_id}"),
        )
    }

    /// Replaces the tentative ids in a committed entry by server ids.
    ///
    /// New entries (version 0) get a server id, recorded in `session`.
    /// Untagged new entries also get their originator fields stamped. The
    /// parent and ordering hint are remapped if they name an entry assigned
    /// earlier in the session.
    pub fn assign(&self, entry: &mut SyncEntity, cache_guid: &str, session: &mut CommitSession) {
        if entry.version == 0 {
            let data_type = entry.data_type().unwrap_or(DataType::TopLevel);
            let server_id = match entry.client_defined_unique_tag.as_deref() {
                Some(tag) => self.client_tag_id(data_type, tag),
                None => {
                    entry.originator_cache_guid = Some(cache_guid.to_string());
                    entry.originator_client_item_id = Some(entry.id_string.clone());
                    self.client_item_id(data_type, cache_guid, &entry.id_string)
                }
            };
            let tentative = std::mem::replace(&mut entry.id_string, server_id.clone());
            session.record(tentative, server_id);
        }
        if let Some(parent) = entry.parent_id_string.as_mut() {
            if let Some(server_id) = session.resolve(parent) {
                *parent = server_id.to_string();
            }
        }
        if let Some(after) = entry.insert_after_item_id.as_mut() {
            if let Some(server_id) = session.resolve(after) {
                *after = server_id.to_string();
            }
        }
    }

    /// Rewrites a server id to the current migration version of its type.
    /// Other ids are returned unchanged.
    pub fn refresh(&self, id: &str) -> String {
        match ServerId::parse(id) {
            Some(parsed) => self.current_id(parsed.data_type, parsed.inner),
            None => id.to_string(),
        }
    }
}
