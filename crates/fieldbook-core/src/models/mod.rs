//! Data models for Fieldbook

mod collection;
mod envelope;
mod mutation;
mod sync_metadata;

pub use collection::Collection;
pub use envelope::{Envelope, RecordId};
pub use mutation::{MutationAction, MutationEntry, MutationId, MutationStatus};
pub use sync_metadata::{RemoteSyncMetadata, SyncMetadata, SYNC_METADATA_PATH};
