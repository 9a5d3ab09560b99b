//! Sync engine: moves queued local mutations to the remote store and pulls
//! newer remote envelopes back, one pass at a time.

mod listener;
mod orchestrator;
mod scheduler;
mod status;

pub use listener::{ListenerId, SyncListener};
pub use orchestrator::{SyncOptions, SyncOrchestrator};
pub use scheduler::{AutoSyncHandle, DEFAULT_AUTO_SYNC_INTERVAL};
pub use status::{SyncIssue, SyncResult, SyncStatus};
