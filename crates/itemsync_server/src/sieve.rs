//! The per-request type and cursor filter for GetUpdates.

use crate::error::ServerResult;
use crate::migration::MigrationHistory;
use itemsync_protocol::{
    summarize_types, CodecResult, DataType, DataTypeProgressMarker, GetUpdatesMessage,
    GetUpdatesResponse, SyncEntity,
};
use std::collections::BTreeMap;

/// Which types a GetUpdates request wants and from which version on.
#[derive(Debug, Clone)]
pub struct UpdateSieve {
    state: BTreeMap<DataType, i64>,
    migration_versions: BTreeMap<DataType, i64>,
    legacy_timestamp: Option<i64>,
    create_mobile_bookmarks: bool,
}

impl UpdateSieve {
    /// Builds the sieve from a request.
    ///
    /// Progress markers take precedence over the legacy timestamp, which
    /// predates migrations and is checked as migration version 1. The
    /// top-level type is always added, at the lowest cursor of any type.
    ///
    /// # Errors
    ///
    /// Fails if a progress marker carries no usable cursor.
    pub fn new(request: &GetUpdatesMessage) -> CodecResult<Self> {
        let mut state = BTreeMap::new();
        let mut migration_versions = BTreeMap::new();
        let mut legacy_timestamp = None;

        if !request.from_progress_marker.is_empty() {
            for marker in &request.from_progress_marker {
                let position = marker.position()?;
                if let Some(version) = position.migration_version {
                    migration_versions.insert(marker.data_type, version);
                }
                state.insert(marker.data_type, position.timestamp);
            }
        } else if let Some(timestamp) = request.from_timestamp {
            for data_type in &request.requested_types {
                state.insert(*data_type, timestamp);
                migration_versions.insert(*data_type, 1);
            }
            legacy_timestamp = Some(timestamp);
        }

        if let Some(floor) = state.values().min().copied() {
            state.insert(DataType::TopLevel, floor);
        }

        Ok(Self {
            state,
            migration_versions,
            legacy_timestamp,
            create_mobile_bookmarks: request.create_mobile_bookmarks_folder,
        })
    }

    /// Describes the sieve for log output, grouping types by cursor.
    pub fn summarize(&self) -> String {
        let mut by_cursor: BTreeMap<i64, Vec<DataType>> = BTreeMap::new();
        for (data_type, cursor) in &self.state {
            by_cursor.entry(*cursor).or_default().push(*data_type);
        }
        let parts: Vec<String> = by_cursor
            .into_iter()
            .map(|(cursor, types)| format!("{}@{cursor}", summarize_types(types)))
            .collect();
        if parts.is_empty() {
            "nothing".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Rejects the request if a marker was issued before a migration.
    pub fn check_migration_state(&self, history: &MigrationHistory) -> ServerResult<()> {
        history.check_all_current(&self.migration_versions)
    }

    /// Returns true if the request subscribes to any type.
    pub fn has_any_subscription(&self) -> bool {
        !self.state.is_empty()
    }

    /// Returns the lowest cursor over all subscribed types.
    pub fn min_timestamp(&self) -> i64 {
        self.state.values().min().copied().unwrap_or(0)
    }

    /// Returns the subscribed types the client has never synced.
    pub fn first_time_types(&self) -> Vec<DataType> {
        self.state
            .iter()
            .filter(|(_, cursor)| **cursor == 0)
            .map(|(data_type, _)| *data_type)
            .collect()
    }

    /// Returns true if the request asked for the Synced Bookmarks folder.
    pub fn create_mobile_bookmarks(&self) -> bool {
        self.create_mobile_bookmarks
    }

    /// Returns true if the client wants `entity`.
    ///
    /// Untyped entities (tombstones) are filtered against the top-level
    /// cursor.
    pub fn wants_item(&self, entity: &SyncEntity) -> bool {
        let data_type = entity.data_type().unwrap_or(DataType::TopLevel);
        let cursor = self.state.get(&data_type).copied().unwrap_or(i64::MAX);
        cursor < entity.version
    }

    /// Writes the new cursor into a response.
    ///
    /// With progress markers, one marker is emitted per subscribed type,
    /// carrying the later of the old cursor and `new_timestamp` under the
    /// type's current migration version. With the legacy cursor, a new
    /// timestamp is emitted only if it advanced.
    pub fn save_progress(
        &self,
        new_timestamp: i64,
        history: &MigrationHistory,
        response: &mut GetUpdatesResponse,
    ) -> CodecResult<()> {
        if let Some(old_timestamp) = self.legacy_timestamp {
            if old_timestamp < new_timestamp {
                response.new_timestamp = Some(new_timestamp);
            }
            return Ok(());
        }
        for (data_type, old_timestamp) in &self.state {
            if *data_type == DataType::TopLevel {
                continue;
            }
            response.new_progress_marker.push(DataTypeProgressMarker::at(
                *data_type,
                (*old_timestamp).max(new_timestamp),
                history.latest(*data_type),
            )?);
        }
        Ok(())
    }
}
