//! Mutation queue repository implementation

use crate::error::{Error, Result};
use crate::models::{MutationEntry, MutationId, MutationStatus};
use rusqlite::types::Type;
use rusqlite::{params, Connection};

/// Trait for mutation queue storage operations
pub trait MutationQueueRepository {
    /// Append an entry to the end of the queue
    fn enqueue(&self, entry: &MutationEntry) -> Result<()>;

    /// Get an entry by id
    fn get(&self, id: &MutationId) -> Result<Option<MutationEntry>>;

    /// List entries in insertion order, optionally filtered by status
    fn list(&self, status: Option<MutationStatus>) -> Result<Vec<MutationEntry>>;

    /// Set an entry's status; `error` is stored only for `MutationStatus::Error`
    fn set_status(
        &self,
        id: &MutationId,
        status: MutationStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Delete entries already `synced`, returning how many were removed
    fn purge_synced(&self) -> Result<usize>;

    /// Move every `error` entry back to `pending`
    fn requeue_failed(&self) -> Result<usize>;

    /// Number of entries with the given status
    fn count(&self, status: MutationStatus) -> Result<u64>;
}

/// `SQLite` implementation of `MutationQueueRepository`
pub struct SqliteMutationQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteMutationQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn conversion_error(
        index: usize,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    }

    /// Parse a queue entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<MutationEntry> {
        let id: String = row.get(0)?;
        let action: String = row.get(1)?;
        let payload: Option<serde_json::Value> = row.get(3)?;
        let status: String = row.get(4)?;

        Ok(MutationEntry {
            id: id.parse().map_err(|e| Self::conversion_error(0, e))?,
            action: action.parse().map_err(|e| Self::conversion_error(1, e))?,
            path: row.get(2)?,
            payload: payload
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| Self::conversion_error(3, e))?,
            status: status.parse().map_err(|e| Self::conversion_error(4, e))?,
            error: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

const SELECT_ENTRY: &str =
    "SELECT id, action, path, payload, status, error, created_at FROM sync_queue";

impl MutationQueueRepository for SqliteMutationQueueRepository<'_> {
    fn enqueue(&self, entry: &MutationEntry) -> Result<()> {
        let payload = entry
            .payload
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        self.conn.execute(
            "INSERT INTO sync_queue (id, action, path, payload, status, error, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.id.as_str(),
                entry.action.as_str(),
                entry.path,
                payload,
                entry.status.as_str(),
                entry.error,
                entry.created_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &MutationId) -> Result<Option<MutationEntry>> {
        let result = self.conn.query_row(
            &format!("{SELECT_ENTRY} WHERE id = ?"),
            params![id.as_str()],
            Self::parse_entry,
        );

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, status: Option<MutationStatus>) -> Result<Vec<MutationEntry>> {
        let entries = if let Some(status) = status {
            let mut stmt = self
                .conn
                .prepare(&format!("{SELECT_ENTRY} WHERE status = ? ORDER BY seq"))?;
            let rows = stmt
                .query_map(params![status.as_str()], Self::parse_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        } else {
            let mut stmt = self.conn.prepare(&format!("{SELECT_ENTRY} ORDER BY seq"))?;
            let rows = stmt
                .query_map([], Self::parse_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        Ok(entries)
    }

    fn set_status(
        &self,
        id: &MutationId,
        status: MutationStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let error = match status {
            MutationStatus::Error => Some(error.unwrap_or("unknown error")),
            MutationStatus::Pending | MutationStatus::Synced => None,
        };

        let rows = self.conn.execute(
            "UPDATE sync_queue SET status = ?, error = ? WHERE id = ?",
            params![status.as_str(), error, id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("queue entry {id}")));
        }
        Ok(())
    }

    fn purge_synced(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM sync_queue WHERE status = ?",
            params![MutationStatus::Synced.as_str()],
        )?;
        Ok(rows)
    }

    fn requeue_failed(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE sync_queue SET status = ?, error = NULL WHERE status = ?",
            params![
                MutationStatus::Pending.as_str(),
                MutationStatus::Error.as_str()
            ],
        )?;
        Ok(rows)
    }

    fn count(&self, status: MutationStatus) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE status = ?",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
