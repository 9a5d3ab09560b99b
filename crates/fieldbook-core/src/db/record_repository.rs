//! Record repository implementation

use crate::error::{Error, Result};
use crate::models::{Collection, Envelope, RecordId};
use rusqlite::{params, Connection};

/// Trait for envelope storage operations, partitioned by collection
pub trait RecordRepository {
    /// Get an envelope by collection and id
    fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Envelope>>;

    /// Insert or replace an envelope
    fn upsert(&self, collection: Collection, envelope: &Envelope) -> Result<()>;

    /// List every envelope in a collection
    fn list(&self, collection: Collection) -> Result<Vec<Envelope>>;

    /// Delete an envelope, returning whether a row existed
    fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool>;

    /// Number of envelopes in a collection
    fn count(&self, collection: Collection) -> Result<u64>;
}

/// `SQLite` implementation of `RecordRepository`
pub struct SqliteRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an envelope from a database row
    fn parse_envelope(row: &rusqlite::Row<'_>) -> rusqlite::Result<Envelope> {
        let id: String = row.get(0)?;
        let version: i64 = row.get(1)?;
        Ok(Envelope {
            id: id.parse().map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(error),
                )
            })?,
            version: u64::try_from(version).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Integer,
                    Box::new(error),
                )
            })?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            payload: row.get(4)?,
        })
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Envelope>> {
        let result = self.conn.query_row(
            "SELECT id, version, created_at, updated_at, payload
             FROM records
             WHERE collection = ? AND id = ?",
            params![collection.as_str(), id.as_str()],
            Self::parse_envelope,
        );

        match result {
            Ok(envelope) => Ok(Some(envelope)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(&self, collection: Collection, envelope: &Envelope) -> Result<()> {
        let version = i64::try_from(envelope.version).map_err(|_| {
            Error::InvalidInput(format!(
                "Record {} has an out-of-range version {}",
                envelope.id, envelope.version
            ))
        })?;
        self.conn.execute(
            "INSERT INTO records (collection, id, version, created_at, updated_at, payload)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET
                version = excluded.version,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                payload = excluded.payload",
            params![
                collection.as_str(),
                envelope.id.as_str(),
                version,
                envelope.created_at,
                envelope.updated_at,
                envelope.payload
            ],
        )?;
        Ok(())
    }

    fn list(&self, collection: Collection) -> Result<Vec<Envelope>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, version, created_at, updated_at, payload
             FROM records
             WHERE collection = ?
             ORDER BY created_at, id",
        )?;

        let envelopes = stmt
            .query_map(params![collection.as_str()], Self::parse_envelope)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(envelopes)
    }

    fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM records WHERE collection = ? AND id = ?",
            params![collection.as_str(), id.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn count(&self, collection: Collection) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?",
            params![collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
