//! # Update Archive
//!
//! A disk-backed log of encoded scene updates, using the redb embedded
//! database.
//!
//! The archive stores each forwarded update payload under its sequence
//! number, giving:
//! - ACID transactions and crash safety (copy-on-write B-trees)
//! - deterministic, sequence-ordered replay
//! - zero configuration
//!
//! The archive is a backup channel, not a correctness requirement: the
//! live update stream flows through ports regardless of whether an
//! archive is attached (see
//! [`UpdateSerializer::with_archive`](crate::formats::updates::UpdateSerializer::with_archive)).

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

use crate::types::SceneGraphError;

/// Table for updates: sequence number -> encoded update payload.
const UPDATES: TableDefinition<u64, &[u8]> = TableDefinition::new("updates");

/// A disk-backed, sequence-ordered store of update payloads.
pub struct UpdateArchive {
    db: Database,
}

impl std::fmt::Debug for UpdateArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateArchive").finish_non_exhaustive()
    }
}

impl UpdateArchive {
    /// Open or create an archive at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SceneGraphError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?;

        // Initialize the table if it doesn't exist
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(UPDATES)
                .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// Store one payload under its sequence number.
    pub fn store(&self, sequence: u64, payload: &[u8]) -> Result<(), SceneGraphError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(UPDATES)
                .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
            table
                .insert(sequence, payload)
                .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load the payload stored under a sequence number.
    pub fn load(&self, sequence: u64) -> Result<Option<Vec<u8>>, SceneGraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(UPDATES)
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
        let payload = table
            .get(sequence)
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?
            .map(|guard| guard.value().to_vec());
        Ok(payload)
    }

    /// Number of archived updates.
    pub fn len(&self) -> Result<u64, SceneGraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(UPDATES)
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
        table
            .len()
            .map_err(|e| SceneGraphError::IoError(e.to_string()))
    }

    /// Whether the archive holds no updates.
    pub fn is_empty(&self) -> Result<bool, SceneGraphError> {
        Ok(self.len()? == 0)
    }

    /// All archived payloads in ascending sequence order, for replay.
    pub fn replay(&self) -> Result<Vec<(u64, Vec<u8>)>, SceneGraphError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(UPDATES)
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?;

        let mut entries = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| SceneGraphError::IoError(e.to_string()))?
        {
            let (key, value) = entry.map_err(|e| SceneGraphError::IoError(e.to_string()))?;
            entries.push((key.value(), value.value().to_vec()));
        }
        Ok(entries)
    }
}

// =============================================================================
// TESTS
// =============================================================================
