//! The in-memory account store.
//!
//! One account holds every entity ever committed, keyed by server id, and a
//! global version counter. Every write takes the next version, so the
//! version doubles as the entity's position in the change log that
//! GetUpdates reads from.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::ids::{CommitSession, IdentifierAssigner, ServerId};
use crate::migration::MigrationHistory;
use crate::permanent::{self, PermanentItem, PERMANENT_ITEMS, SYNCED_BOOKMARKS_TAG};
use crate::position::{PositionAllocator, PositionHint, Sibling};
use crate::sieve::UpdateSieve;
use itemsync_protocol::{
    is_root_id, ClientError, DataType, EntitySpecifics, SyncEntity, ROOT_ID,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::Bound;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};

/// Why a commit of one entry was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitConflict {
    /// The client's version is not the stored one.
    #[error("version mismatch for {id}: client has {client_version}, server has {server_version:?}")]
    VersionMismatch {
        /// Entry id.
        id: String,
        /// Version declared by the client.
        client_version: i64,
        /// Stored version, if the entry exists.
        server_version: Option<i64>,
    },

    /// The parent does not exist.
    #[error("parent {0} does not exist")]
    MissingParent(String),

    /// The entry names itself as parent.
    #[error("{0} cannot be its own parent")]
    SelfParent(String),

    /// The parent is a tombstone.
    #[error("parent {0} is deleted")]
    DeletedParent(String),

    /// The parent is not a folder.
    #[error("parent {0} is not a folder")]
    NonFolderParent(String),
}

/// One page of changes for a GetUpdates response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    /// Version of the last entry in the page, before type filtering.
    pub new_timestamp: i64,
    /// Entries the client subscribed to.
    pub entries: Vec<SyncEntity>,
    /// Changes past this page.
    pub changes_remaining: i64,
}

/// The single account's entities and version counter.
#[derive(Debug)]
pub struct AccountStore {
    version: i64,
    entries: HashMap<String, SyncEntity>,
    /// Version -> id, for every stored entity.
    change_log: BTreeMap<i64, String>,
    /// Parent id -> ids of its live children.
    children: HashMap<String, BTreeSet<String>>,
    store_birthday: String,
    migration_history: MigrationHistory,
    induced_error: Option<ClientError>,
    batch_size: usize,
    positions: PositionAllocator,
}

impl AccountStore {
    /// Creates an empty account with default settings.
    pub fn new() -> Self {
        Self::from_config(&ServerConfig::default())
    }

    /// Creates an empty account.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            version: 0,
            entries: HashMap::new(),
            change_log: BTreeMap::new(),
            children: HashMap::new(),
            store_birthday: new_birthday(),
            migration_history: MigrationHistory::new(),
            induced_error: None,
            batch_size: config.batch_size.max(1),
            positions: PositionAllocator::new(config.position_gap),
        }
    }

    /// Returns the last version handed out.
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the store birthday.
    pub fn store_birthday(&self) -> &str {
        &self.store_birthday
    }

    /// Returns the migration history.
    pub fn migration_history(&self) -> &MigrationHistory {
        &self.migration_history
    }

    /// Returns the stored entity with the given id.
    pub fn entity(&self, id: &str) -> Option<&SyncEntity> {
        self.entries.get(id)
    }

    /// Returns the number of stored entities, tombstones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the error every response must carry, if any.
    pub fn induced_error(&self) -> Option<&ClientError> {
        self.induced_error.as_ref()
    }

    /// Sets or clears the error every response must carry.
    pub fn set_induced_error(&mut self, error: Option<ClientError>) {
        self.induced_error = error;
    }

    /// Replaces the store birthday, invalidating every client's state.
    pub fn reset_store_birthday(&mut self) -> &str {
        self.store_birthday = new_birthday();
        info!(birthday = %self.store_birthday, "store birthday reset");
        &self.store_birthday
    }

    /// Returns the id of a permanent item under the current migration.
    pub fn permanent_item_id(&self, tag: &str) -> Option<String> {
        IdentifierAssigner::new(&self.migration_history).server_tag_id(tag)
    }

    /// Commits one entry.
    ///
    /// Tentative ids are resolved through `session`, which must be shared by
    /// every entry of one commit request. Entries with a client-defined tag
    /// always live in their type's root folder, whatever parent they name.
    /// On success the stored entity is returned; on conflict nothing
    /// changes.
    pub fn commit_entry(
        &mut self,
        entry: &SyncEntity,
        cache_guid: &str,
        session: &mut CommitSession,
    ) -> Result<SyncEntity, CommitConflict> {
        let mut entry = entry.clone();
        let assigner = IdentifierAssigner::new(&self.migration_history);
        assigner.assign(&mut entry, cache_guid, session);
        if entry.client_defined_unique_tag.is_some() {
            let data_type = entry.data_type().unwrap_or(DataType::TopLevel);
            if let Some(root_id) = assigner.type_root_id(data_type) {
                entry.parent_id_string = Some(root_id);
            }
        }

        self.check_version(&entry)?;
        self.check_parent(&entry)?;

        if entry.deleted {
            for id in self.live_descendants(&entry.id_string) {
                self.save_entry(SyncEntity::tombstone(id));
            }
            return Ok(self.save_entry(SyncEntity::tombstone(entry.id_string)));
        }

        if let Some(base) = self.entries.get(&entry.id_string) {
            if base.server_defined_unique_tag.is_some() {
                entry.server_defined_unique_tag = base.server_defined_unique_tag.clone();
            }
            if entry.originator_cache_guid.is_none() {
                entry.originator_cache_guid = base.originator_cache_guid.clone();
            }
            if entry.originator_client_item_id.is_none() {
                entry.originator_client_item_id = base.originator_client_item_id.clone();
            }
        }

        entry.position_in_parent = Some(self.allocate_position(&entry));
        entry.insert_after_item_id = None;
        Ok(self.save_entry(entry))
    }

    fn check_version(&self, entry: &SyncEntity) -> Result<(), CommitConflict> {
        let server_version = match self.entries.get(&entry.id_string) {
            Some(stored) if stored.deleted || stored.version == entry.version => return Ok(()),
            Some(stored) => Some(stored.version),
            None if entry.version == 0 => return Ok(()),
            None => None,
        };
        Err(CommitConflict::VersionMismatch {
            id: entry.id_string.clone(),
            client_version: entry.version,
            server_version,
        })
    }

    fn check_parent(&self, entry: &SyncEntity) -> Result<(), CommitConflict> {
        let parent_id = entry.parent_id();
        if is_root_id(parent_id) {
            return Ok(());
        }
        let Some(parent) = self.entries.get(parent_id) else {
            return Err(CommitConflict::MissingParent(parent_id.to_string()));
        };
        if parent_id == entry.id_string {
            return Err(CommitConflict::SelfParent(parent_id.to_string()));
        }
        if parent.deleted {
            return Err(CommitConflict::DeletedParent(parent_id.to_string()));
        }
        if !parent.folder {
            return Err(CommitConflict::NonFolderParent(parent_id.to_string()));
        }
        Ok(())
    }

    /// Live descendants of `id`, breadth first.
    fn live_descendants(&self, id: &str) -> Vec<String> {
        let mut found = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut queue: VecDeque<&str> = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let Some(children) = self.children.get(current) else {
                continue;
            };
            for child in children {
                if seen.insert(child.as_str()) {
                    found.push(child.clone());
                    queue.push_back(child.as_str());
                }
            }
        }
        found
    }

    fn allocate_position(&self, entry: &SyncEntity) -> i64 {
        let mut siblings: Vec<Sibling<'_>> = self
            .children
            .get(parent_key(entry))
            .into_iter()
            .flatten()
            .filter_map(|id| self.entries.get(id))
            .map(|sibling| Sibling {
                id: &sibling.id_string,
                position: sibling.position_in_parent.unwrap_or(0),
            })
            .collect();
        siblings.sort_by_key(|sibling| sibling.position);
        self.positions
            .allocate(&entry.id_string, &siblings, PositionHint::of(entry))
    }

    /// Stores `entity` under a fresh version.
    fn save_entry(&mut self, mut entity: SyncEntity) -> SyncEntity {
        self.version += 1;
        entity.version = self.version;
        entity.sync_timestamp = self.version;
        entity.mtime = now_millis();

        if let Some(previous) = self.entries.remove(&entity.id_string) {
            self.unlink(&previous);
        }
        self.link(&entity);
        self.entries
            .insert(entity.id_string.clone(), entity.clone());
        entity
    }

    fn link(&mut self, entity: &SyncEntity) {
        self.change_log
            .insert(entity.version, entity.id_string.clone());
        if !entity.deleted {
            self.children
                .entry(parent_key(entity).to_string())
                .or_default()
                .insert(entity.id_string.clone());
        }
    }

    fn unlink(&mut self, entity: &SyncEntity) {
        self.change_log.remove(&entity.version);
        if !entity.deleted {
            if let Some(siblings) = self.children.get_mut(parent_key(entity)) {
                siblings.remove(&entity.id_string);
            }
        }
    }

    /// Returns the next page of changes the sieve lets through.
    ///
    /// Permanent folders of types the client sees for the first time are
    /// created before scanning. The Synced Bookmarks folder is only created
    /// when the request asks for it on a first bookmark sync.
    pub fn get_changes(&mut self, sieve: &UpdateSieve) -> ChangeBatch {
        if !sieve.has_any_subscription() {
            return ChangeBatch::default();
        }
        let floor = sieve.min_timestamp();
        let first_time_types = sieve.first_time_types();
        self.create_permanent_items(&first_time_types);
        if sieve.create_mobile_bookmarks() && first_time_types.contains(&DataType::Bookmark) {
            self.create_synced_bookmarks();
        }

        let pending: Vec<&SyncEntity> = self
            .change_log
            .range((Bound::Excluded(floor), Bound::Unbounded))
            .filter_map(|(_, id)| self.entries.get(id))
            .collect();
        let page = &pending[..pending.len().min(self.batch_size)];

        ChangeBatch {
            new_timestamp: page.last().map_or(floor, |entity| entity.version),
            entries: page
                .iter()
                .filter(|entity| entity.deleted || sieve.wants_item(entity))
                .map(|entity| (*entity).clone())
                .collect(),
            changes_remaining: i64::try_from(pending.len() - page.len()).unwrap_or(i64::MAX),
        }
    }

    fn create_permanent_items(&mut self, data_types: &[DataType]) {
        for item in PERMANENT_ITEMS {
            if item.create_by_default && data_types.contains(&item.data_type) {
                self.create_permanent_item(item);
            }
        }
    }

    /// Creates the Synced Bookmarks folder under the bookmarks root, if it
    /// does not exist yet.
    pub fn create_synced_bookmarks(&mut self) {
        if let Some(item) = permanent::find(SYNCED_BOOKMARKS_TAG) {
            self.create_permanent_item(item);
        }
    }

    fn create_permanent_item(&mut self, item: &PermanentItem) {
        let assigner = IdentifierAssigner::new(&self.migration_history);
        let (Some(id), Some(parent_id)) = (
            assigner.server_tag_id(item.tag),
            assigner.server_tag_id(item.parent_tag),
        ) else {
            return;
        };
        if self.entries.contains_key(&id) {
            return;
        }

        info!(tag = item.tag, id = %id, "creating permanent item");
        let mut entity = SyncEntity {
            id_string: id,
            parent_id_string: Some(parent_id),
            folder: true,
            name: item.name.to_string(),
            non_unique_name: item.name.to_string(),
            server_defined_unique_tag: Some(item.tag.to_string()),
            specifics: EntitySpecifics::default_for(item.data_type),
            ..SyncEntity::default()
        };
        entity.position_in_parent = Some(self.allocate_position(&entity));
        self.save_entry(entity);
    }

    /// Checks that a commit does not touch ids minted before a migration
    /// the client has not caught up with.
    ///
    /// Server ids in the batch are those of entries with a nonzero version,
    /// and parents that are not created earlier in the same batch.
    pub fn validate_commit_entries(&self, entries: &[SyncEntity]) -> ServerResult<()> {
        let mut local_ids: HashSet<&str> = HashSet::new();
        let mut server_ids: HashSet<&str> = HashSet::new();
        for entry in entries {
            if entry.version != 0 {
                server_ids.insert(entry.id_string.as_str());
            } else {
                local_ids.insert(entry.id_string.as_str());
            }
            if let Some(parent) = entry.parent_id_string.as_deref() {
                if !local_ids.contains(parent) {
                    server_ids.insert(parent);
                }
            }
        }

        let mut versions_present: BTreeMap<DataType, i64> = BTreeMap::new();
        for id in server_ids {
            if let Some(parsed) = ServerId::parse(id) {
                versions_present
                    .entry(parsed.data_type)
                    .and_modify(|version| *version = (*version).min(parsed.migration_version))
                    .or_insert(parsed.migration_version);
            }
        }
        self.migration_history.check_all_current(&versions_present)
    }

    /// Migrates `data_types`: bumps their migration version and rewrites
    /// every id to the current version of its type.
    ///
    /// Entity versions are left alone; clients are forced to resync the
    /// migrated types by the migration check instead.
    pub fn trigger_migration(&mut self, data_types: &[DataType]) {
        if data_types.is_empty() {
            return;
        }
        let migration_version = self.migration_history.bump(data_types);
        info!(
            migration_version,
            types = %itemsync_protocol::summarize_types(data_types.iter().copied()),
            "migration triggered"
        );

        let assigner = IdentifierAssigner::new(&self.migration_history);
        let rewritten: Vec<SyncEntity> = std::mem::take(&mut self.entries)
            .into_values()
            .map(|mut entity| {
                entity.id_string = assigner.refresh(&entity.id_string);
                if let Some(parent) = entity.parent_id_string.as_mut() {
                    *parent = assigner.refresh(parent);
                }
                entity
            })
            .collect();

        self.change_log.clear();
        self.children.clear();
        for entity in rewritten {
            self.link(&entity);
            self.entries.insert(entity.id_string.clone(), entity);
        }
        debug!(entities = self.entries.len(), "ids rewritten");
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Key of the parent in the children index. Both root spellings share one
/// key.
fn parent_key(entity: &SyncEntity) -> &str {
    let parent_id = entity.parent_id();
    if is_root_id(parent_id) {
        ROOT_ID
    } else {
        parent_id
    }
}

fn new_birthday() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
