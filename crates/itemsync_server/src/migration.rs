//! Per-type migration history.
//!
//! A migration bumps the version of one or more types and rewrites every
//! id of those types. Clients that synced under an older version are told
//! to resync the affected types.

use crate::error::{ServerError, ServerResult};
use itemsync_protocol::DataType;
use std::collections::{BTreeMap, HashMap};

/// Migration versions each type has gone through.
#[derive(Debug, Clone)]
pub struct MigrationHistory {
    migrations: HashMap<DataType, Vec<i64>>,
    next_migration_version: i64,
}

impl MigrationHistory {
    /// Creates a history where every type sits at migration version 1.
    pub fn new() -> Self {
        let migrations = DataType::ALL
            .iter()
            .map(|data_type| (*data_type, vec![1]))
            .collect();
        Self {
            migrations,
            next_migration_version: 2,
        }
    }

    /// Returns the current migration version of a type.
    pub fn latest(&self, data_type: DataType) -> i64 {
        self.migrations
            .get(&data_type)
            .and_then(|versions| versions.last().copied())
            .unwrap_or(1)
    }

    /// Checks that every client-reported version is current.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::MigrationDone`] naming the types affected by
    /// the oldest migration the client has missed.
    pub fn check_all_current(&self, versions: &BTreeMap<DataType, i64>) -> ServerResult<()> {
        let mut problems: BTreeMap<i64, Vec<DataType>> = BTreeMap::new();
        for (data_type, client_migration) in versions {
            let Some(server_migrations) = self.migrations.get(data_type) else {
                continue;
            };
            for server_migration in server_migrations {
                if client_migration < server_migration {
                    problems
                        .entry(*server_migration)
                        .or_default()
                        .push(*data_type);
                }
            }
        }
        match problems.into_iter().next() {
            Some((_, data_types)) => Err(ServerError::MigrationDone { data_types }),
            None => Ok(()),
        }
    }

    /// Records a new migration covering `data_types`.
    ///
    /// Returns the new migration version.
    pub fn bump(&mut self, data_types: &[DataType]) -> i64 {
        let version = self.next_migration_version;
        for data_type in data_types {
            self.migrations.entry(*data_type).or_default().push(version);
        }
        self.next_migration_version += 1;
        version
    }
}

impl Default for MigrationHistory {
    fn default() -> Self {
        Self::new()
    }
}
