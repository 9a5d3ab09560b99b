//! fieldbook-core - Core library for Fieldbook
//!
//! Offline-first record storage with a sync engine that replicates
//! versioned envelopes to a remote file store. The CLI and any other
//! front end build on the types re-exported here.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod store;
pub mod sync;
pub mod util;

#[cfg(test)]
mod test_http;

pub use config::RemoteConfig;
pub use error::{Error, Result};
pub use models::{Collection, Envelope, MutationAction, MutationEntry, MutationStatus, RecordId};
pub use remote::{LocalDirStore, RemoteStore, YandexDiskStore};
pub use services::RecordService;
pub use store::{LocalStore, StoreStats};
pub use sync::{SyncOptions, SyncOrchestrator, SyncResult, SyncStatus};
