//! Database layer for Fieldbook

mod connection;
mod metadata_repository;
mod migrations;
mod queue_repository;
mod record_repository;

pub use connection::Database;
pub use metadata_repository::{SqliteSyncMetadataRepository, SyncMetadataRepository};
pub use queue_repository::{MutationQueueRepository, SqliteMutationQueueRepository};
pub use record_repository::{RecordRepository, SqliteRecordRepository};
