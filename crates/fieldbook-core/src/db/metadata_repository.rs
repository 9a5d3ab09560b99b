//! Sync metadata repository implementation

use crate::error::Result;
use crate::models::SyncMetadata;
use rusqlite::{params, Connection};

/// Trait for the single-row sync metadata record
pub trait SyncMetadataRepository {
    /// Load the last pass summary, if any pass has completed
    fn load(&self) -> Result<Option<SyncMetadata>>;

    /// Replace the stored summary
    fn save(&self, metadata: &SyncMetadata) -> Result<()>;
}

/// `SQLite` implementation of `SyncMetadataRepository`
pub struct SqliteSyncMetadataRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncMetadataRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SyncMetadataRepository for SqliteSyncMetadataRepository<'_> {
    fn load(&self) -> Result<Option<SyncMetadata>> {
        let result = self.conn.query_row(
            "SELECT last_sync_at, files_synced, pending_changes FROM sync_metadata WHERE id = 1",
            [],
            |row| {
                let files_synced: i64 = row.get(1)?;
                let pending_changes: i64 = row.get(2)?;
                Ok(SyncMetadata {
                    last_sync_at: row.get(0)?,
                    files_synced: u64::try_from(files_synced).unwrap_or_default(),
                    pending_changes: u64::try_from(pending_changes).unwrap_or_default(),
                })
            },
        );

        match result {
            Ok(metadata) => Ok(Some(metadata)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, metadata: &SyncMetadata) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_metadata (id, last_sync_at, files_synced, pending_changes)
             VALUES (1, ?, ?, ?)",
            params![
                metadata.last_sync_at,
                i64::try_from(metadata.files_synced).unwrap_or(i64::MAX),
                i64::try_from(metadata.pending_changes).unwrap_or(i64::MAX)
            ],
        )?;
        Ok(())
    }
}
