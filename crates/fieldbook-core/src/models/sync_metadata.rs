//! Sync metadata model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote path of the metadata document
pub const SYNC_METADATA_PATH: &str = "metadata/sync-status.json";

const METADATA_FORMAT_VERSION: &str = "1.0";

/// Summary of the last completed pass, rewritten wholesale each time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    pub last_sync_at: DateTime<Utc>,
    /// Uploaded plus downloaded files in the pass
    pub files_synced: u64,
    /// Queue depth at the end of the pass
    pub pending_changes: u64,
}

/// Document shape written to `metadata/sync-status.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSyncMetadata {
    pub last_sync_at: DateTime<Utc>,
    pub last_sync_user: String,
    pub files_synced: u64,
    pub pending_changes: u64,
    pub version: String,
}

impl SyncMetadata {
    #[must_use]
    pub fn to_remote(&self, user: &str) -> RemoteSyncMetadata {
        RemoteSyncMetadata {
            last_sync_at: self.last_sync_at,
            last_sync_user: user.to_string(),
            files_synced: self.files_synced,
            pending_changes: self.pending_changes,
            version: METADATA_FORMAT_VERSION.to_string(),
        }
    }
}
