//! The sync entity, the unit of synchronization.

use crate::data_type::{DataType, ROOT_ID, TOP_LEVEL_FOLDER_TAG};
use serde::{Deserialize, Serialize};

/// Returns true if `id` names the root, i.e. marks a top-level node.
///
/// Both the root sentinel and an empty id are accepted.
pub fn is_root_id(id: &str) -> bool {
    id.is_empty() || id == ROOT_ID
}

/// The type-discriminated payload of an entity.
///
/// The server never looks inside `value`; only the type matters to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpecifics {
    /// Which item type this payload belongs to.
    pub data_type: DataType,
    /// Opaque type-specific content.
    #[serde(default)]
    pub value: Vec<u8>,
}

impl EntitySpecifics {
    /// Creates specifics of the given type with the given payload.
    pub fn new(data_type: DataType, value: impl Into<Vec<u8>>) -> Self {
        Self {
            data_type,
            value: value.into(),
        }
    }

    /// Creates the empty default specifics for a type.
    ///
    /// The top-level type has no specifics at all.
    pub fn default_for(data_type: DataType) -> Option<Self> {
        match data_type {
            DataType::TopLevel => None,
            other => Some(Self::new(other, Vec::new())),
        }
    }
}

/// A synced item, as committed by clients and returned by GetUpdates.
///
/// The same shape is used for client commits (where `id_string` may be a
/// client-tentative id and `version` is the version the client last saw)
/// and for server records (where every id is a server id and `version` is
/// the item's position in the account's change log).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntity {
    /// Item id; unique within the account once assigned by the server.
    pub id_string: String,
    /// Parent folder id, or the root sentinel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id_string: Option<String>,
    /// Version; `0` means the client believes the item is new.
    #[serde(default)]
    pub version: i64,
    /// Always equal to `version` on server records.
    #[serde(default)]
    pub sync_timestamp: i64,
    /// Last modification time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub mtime: i64,
    /// Sparse sibling ordering key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_in_parent: Option<i64>,
    /// Relative ordering hint: place this item right after the named
    /// sibling. Empty means first. Never stored by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_after_item_id: Option<String>,
    /// Whether the item is a tombstone.
    #[serde(default)]
    pub deleted: bool,
    /// Whether the item can hold children.
    #[serde(default)]
    pub folder: bool,
    /// Item name.
    #[serde(default)]
    pub name: String,
    /// Display name.
    #[serde(default)]
    pub non_unique_name: String,
    /// Tag of a server-created permanent item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_defined_unique_tag: Option<String>,
    /// Client tag that determines the server id of a new item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_defined_unique_tag: Option<String>,
    /// Cache guid of the client that created the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originator_cache_guid: Option<String>,
    /// Client-local id the item had on the client that created it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originator_client_item_id: Option<String>,
    /// Type-discriminated payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifics: Option<EntitySpecifics>,
}

impl SyncEntity {
    /// Creates a tombstone for `id_string`.
    ///
    /// Only the id and the deletion state survive; the name is cleared.
    pub fn tombstone(id_string: impl Into<String>) -> Self {
        Self {
            id_string: id_string.into(),
            deleted: true,
            ..Self::default()
        }
    }

    /// Determines the item type.
    ///
    /// The top-level folder is recognized by its server tag; everything
    /// else by its specifics. Tombstones carry no type.
    pub fn data_type(&self) -> Option<DataType> {
        if self.server_defined_unique_tag.as_deref() == Some(TOP_LEVEL_FOLDER_TAG) {
            return Some(DataType::TopLevel);
        }
        self.specifics.as_ref().map(|s| s.data_type)
    }

    /// Returns the parent id, treating an absent parent as the root.
    pub fn parent_id(&self) -> &str {
        self.parent_id_string.as_deref().unwrap_or(ROOT_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_ids() {
        assert!(is_root_id(""));
        assert!(is_root_id("0"));
        assert!(!is_root_id("6^1^<server tag>bookmark_bar"));
    }

    #[test]
    fn type_from_specifics_or_tag() {
        let mut entity = SyncEntity {
            specifics: Some(EntitySpecifics::new(DataType::Bookmark, b"url".to_vec())),
            ..SyncEntity::default()
        };
        assert_eq!(entity.data_type(), Some(DataType::Bookmark));

        entity.specifics = None;
        assert_eq!(entity.data_type(), None);

        entity.server_defined_unique_tag = Some(TOP_LEVEL_FOLDER_TAG.to_string());
        assert_eq!(entity.data_type(), Some(DataType::TopLevel));
    }

    #[test]
    fn tombstone_is_bare() {
        let tombstone = SyncEntity::tombstone("x");
        assert!(tombstone.deleted);
        assert_eq!(tombstone.id_string, "x");
        assert!(tombstone.name.is_empty());
        assert_eq!(tombstone.data_type(), None);
        assert_eq!(tombstone.parent_id(), ROOT_ID);
    }

    #[test]
    fn default_specifics() {
        assert_eq!(EntitySpecifics::default_for(DataType::TopLevel), None);
        let bookmark = EntitySpecifics::default_for(DataType::Bookmark).unwrap();
        assert_eq!(bookmark.data_type, DataType::Bookmark);
        assert!(bookmark.value.is_empty());
    }
}
