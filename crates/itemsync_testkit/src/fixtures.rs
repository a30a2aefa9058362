//! Entity builders and request fixtures.

use itemsync_protocol::{
    AuthenticateMessage, ClientToServerMessage, ClientToServerResponse, CommitMessage, DataType,
    DataTypeProgressMarker, EntitySpecifics, GetUpdatesMessage, RequestContents, SyncEntity,
};
use std::collections::BTreeMap;

/// Builder for entities as a client would commit them.
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    entity: SyncEntity,
}

impl EntityBuilder {
    /// Starts a new bookmark with the given id under the root.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            entity: SyncEntity {
                parent_id_string: Some("0".to_string()),
                name: id.clone(),
                non_unique_name: id.clone(),
                id_string: id,
                specifics: Some(EntitySpecifics::new(DataType::Bookmark, Vec::new())),
                ..SyncEntity::default()
            },
        }
    }

    /// Starts from an existing entity, e.g. one returned by the server.
    pub fn from_entity(entity: SyncEntity) -> Self {
        Self { entity }
    }

    /// Sets the parent.
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.entity.parent_id_string = Some(parent_id.into());
        self
    }

    /// Sets the version the client last saw.
    pub fn version(mut self, version: i64) -> Self {
        self.entity.version = version;
        self
    }

    /// Marks the entity as a folder.
    pub fn folder(mut self) -> Self {
        self.entity.folder = true;
        self
    }

    /// Sets the item type.
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.entity.specifics = EntitySpecifics::default_for(data_type);
        self
    }

    /// Sets the payload.
    pub fn payload(mut self, value: impl Into<Vec<u8>>) -> Self {
        if let Some(specifics) = self.entity.specifics.as_mut() {
            specifics.value = value.into();
        }
        self
    }

    /// Sets both names.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.entity.non_unique_name = name.clone();
        self.entity.name = name;
        self
    }

    /// Sets the client-defined unique tag.
    pub fn client_tag(mut self, tag: impl Into<String>) -> Self {
        self.entity.client_defined_unique_tag = Some(tag.into());
        self
    }

    /// Places the entity right after `sibling_id`.
    pub fn after(mut self, sibling_id: impl Into<String>) -> Self {
        self.entity.insert_after_item_id = Some(sibling_id.into());
        self
    }

    /// Places the entity before all siblings.
    pub fn first(self) -> Self {
        self.after("")
    }

    /// Requests an absolute position.
    pub fn position(mut self, position: i64) -> Self {
        self.entity.position_in_parent = Some(position);
        self
    }

    /// Marks the entity deleted.
    pub fn deleted(mut self) -> Self {
        self.entity.deleted = true;
        self
    }

    /// Finishes the entity.
    pub fn build(self) -> SyncEntity {
        self.entity
    }
}

/// A new bookmark under `parent_id`.
pub fn bookmark(id: &str, parent_id: &str) -> SyncEntity {
    EntityBuilder::new(id).parent(parent_id).build()
}

/// A new bookmark folder under `parent_id`.
pub fn folder(id: &str, parent_id: &str) -> SyncEntity {
    EntityBuilder::new(id).parent(parent_id).folder().build()
}

/// An authenticate request.
pub fn authenticate_request() -> ClientToServerMessage {
    ClientToServerMessage::new(RequestContents::Authenticate(AuthenticateMessage {
        auth_token: "token".to_string(),
    }))
}

/// A commit request.
pub fn commit_request(cache_guid: &str, entries: Vec<SyncEntity>) -> ClientToServerMessage {
    ClientToServerMessage::new(RequestContents::Commit(CommitMessage::new(
        entries, cache_guid,
    )))
}

/// A GetUpdates request asking for everything of `data_types`.
pub fn initial_get_updates(data_types: &[DataType]) -> ClientToServerMessage {
    let markers = data_types
        .iter()
        .map(|data_type| DataTypeProgressMarker::initial(*data_type))
        .collect();
    ClientToServerMessage::new(RequestContents::GetUpdates(
        GetUpdatesMessage::with_markers(markers),
    ))
}

/// A GetUpdates request using the legacy single cursor.
pub fn legacy_get_updates(from_timestamp: i64, data_types: &[DataType]) -> ClientToServerMessage {
    ClientToServerMessage::new(RequestContents::GetUpdates(GetUpdatesMessage::legacy(
        from_timestamp,
        data_types.to_vec(),
    )))
}

/// Client-side sync state: progress markers per type and the store
/// birthday last seen.
///
/// Feed every response back through [`TestClient::absorb`] and the next
/// GetUpdates request resumes where the last one ended.
#[derive(Debug, Clone)]
pub struct TestClient {
    /// Cache guid sent with commits.
    pub cache_guid: String,
    markers: BTreeMap<DataType, DataTypeProgressMarker>,
    store_birthday: Option<String>,
}

impl TestClient {
    /// Creates a client with no subscriptions.
    pub fn new(cache_guid: impl Into<String>) -> Self {
        Self {
            cache_guid: cache_guid.into(),
            markers: BTreeMap::new(),
            store_birthday: None,
        }
    }

    /// Subscribes to `data_types` from the beginning.
    pub fn subscribe(mut self, data_types: &[DataType]) -> Self {
        for data_type in data_types {
            self.markers
                .insert(*data_type, DataTypeProgressMarker::initial(*data_type));
        }
        self
    }

    /// Forgets all progress, as after a birthday change.
    pub fn reset(&mut self) {
        for (data_type, marker) in self.markers.iter_mut() {
            *marker = DataTypeProgressMarker::initial(*data_type);
        }
        self.store_birthday = None;
    }

    /// Returns the marker held for a type.
    pub fn marker(&self, data_type: DataType) -> Option<&DataTypeProgressMarker> {
        self.markers.get(&data_type)
    }

    /// Builds a commit request.
    pub fn commit(&self, entries: Vec<SyncEntity>) -> ClientToServerMessage {
        self.stamp(commit_request(&self.cache_guid, entries))
    }

    /// Builds a GetUpdates request from the held markers.
    pub fn get_updates(&self) -> ClientToServerMessage {
        let markers = self.markers.values().cloned().collect();
        self.stamp(ClientToServerMessage::new(RequestContents::GetUpdates(
            GetUpdatesMessage::with_markers(markers),
        )))
    }

    fn stamp(&self, request: ClientToServerMessage) -> ClientToServerMessage {
        match &self.store_birthday {
            Some(birthday) => request.with_store_birthday(birthday.clone()),
            None => request,
        }
    }

    /// Records the birthday and any new markers from a response.
    pub fn absorb(&mut self, response: &ClientToServerResponse) {
        self.store_birthday = Some(response.store_birthday.clone());
        if let Some(updates) = response.get_updates() {
            for marker in &updates.new_progress_marker {
                self.markers.insert(marker.data_type, marker.clone());
            }
        }
    }
}
