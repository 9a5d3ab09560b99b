//! Database connection management

use crate::error::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::migrations;

/// Database wrapper for the primary `SQLite` medium
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;

        let database = Self {
            conn,
            path: Some(path),
        };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let database = Self { conn, path: None };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for durable, concurrent access
    fn configure(&self) -> Result<()> {
        // journal_mode returns a row, and is a no-op for in-memory databases
        self.conn
            .query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))
            .ok();
        self.conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        self.conn.busy_timeout(Duration::from_secs(5))?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Path of the database file, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
    }

    #[test]
    fn test_open_file_creates_schema() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("fieldbook.db");

        let db = Database::open(&db_path).unwrap();
        assert_eq!(db.path(), Some(db_path.as_path()));
        assert!(db_path.exists());

        let count: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('records', 'sync_queue', 'sync_metadata')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_open_rejects_garbage_file() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("fieldbook.db");
        std::fs::write(&db_path, vec![b'x'; 4096]).unwrap();

        assert!(Database::open(&db_path).is_err());
    }
}
