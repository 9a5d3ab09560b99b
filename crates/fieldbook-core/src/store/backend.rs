//! Storage media behind the local store

use std::collections::{BTreeMap, HashMap};

use crate::db::{
    Database, MutationQueueRepository, RecordRepository, SqliteMutationQueueRepository,
    SqliteRecordRepository, SqliteSyncMetadataRepository, SyncMetadataRepository,
};
use crate::error::{Error, Result};
use crate::models::{
    Collection, Envelope, MutationEntry, MutationId, MutationStatus, RecordId, SyncMetadata,
};

/// Operations every storage medium provides. Each call is one unit of work.
pub trait StoreBackend: Send {
    fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Envelope>>;
    fn put(&mut self, collection: Collection, envelope: &Envelope) -> Result<()>;
    fn list(&self, collection: Collection) -> Result<Vec<Envelope>>;
    fn delete(&mut self, collection: Collection, id: &RecordId) -> Result<bool>;
    fn count(&self, collection: Collection) -> Result<u64>;

    fn enqueue(&mut self, entry: &MutationEntry) -> Result<()>;
    fn mutations(&self, status: Option<MutationStatus>) -> Result<Vec<MutationEntry>>;
    fn set_mutation_status(
        &mut self,
        id: &MutationId,
        status: MutationStatus,
        error: Option<&str>,
    ) -> Result<()>;
    fn purge_synced(&mut self) -> Result<usize>;
    fn requeue_failed(&mut self) -> Result<usize>;
    fn count_mutations(&self, status: MutationStatus) -> Result<u64>;

    fn load_metadata(&self) -> Result<Option<SyncMetadata>>;
    fn save_metadata(&mut self, metadata: &SyncMetadata) -> Result<()>;
}

impl StoreBackend for Database {
    fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Envelope>> {
        SqliteRecordRepository::new(self.connection()).get(collection, id)
    }

    fn put(&mut self, collection: Collection, envelope: &Envelope) -> Result<()> {
        SqliteRecordRepository::new(self.connection()).upsert(collection, envelope)
    }

    fn list(&self, collection: Collection) -> Result<Vec<Envelope>> {
        SqliteRecordRepository::new(self.connection()).list(collection)
    }

    fn delete(&mut self, collection: Collection, id: &RecordId) -> Result<bool> {
        SqliteRecordRepository::new(self.connection()).delete(collection, id)
    }

    fn count(&self, collection: Collection) -> Result<u64> {
        SqliteRecordRepository::new(self.connection()).count(collection)
    }

    fn enqueue(&mut self, entry: &MutationEntry) -> Result<()> {
        SqliteMutationQueueRepository::new(self.connection()).enqueue(entry)
    }

    fn mutations(&self, status: Option<MutationStatus>) -> Result<Vec<MutationEntry>> {
        SqliteMutationQueueRepository::new(self.connection()).list(status)
    }

    fn set_mutation_status(
        &mut self,
        id: &MutationId,
        status: MutationStatus,
        error: Option<&str>,
    ) -> Result<()> {
        SqliteMutationQueueRepository::new(self.connection()).set_status(id, status, error)
    }

    fn purge_synced(&mut self) -> Result<usize> {
        SqliteMutationQueueRepository::new(self.connection()).purge_synced()
    }

    fn requeue_failed(&mut self) -> Result<usize> {
        SqliteMutationQueueRepository::new(self.connection()).requeue_failed()
    }

    fn count_mutations(&self, status: MutationStatus) -> Result<u64> {
        SqliteMutationQueueRepository::new(self.connection()).count(status)
    }

    fn load_metadata(&self) -> Result<Option<SyncMetadata>> {
        SqliteSyncMetadataRepository::new(self.connection()).load()
    }

    fn save_metadata(&mut self, metadata: &SyncMetadata) -> Result<()> {
        SqliteSyncMetadataRepository::new(self.connection()).save(metadata)
    }
}

/// In-process fallback medium. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: HashMap<Collection, BTreeMap<RecordId, Envelope>>,
    queue: Vec<MutationEntry>,
    metadata: Option<SyncMetadata>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Envelope>> {
        Ok(self
            .records
            .get(&collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    fn put(&mut self, collection: Collection, envelope: &Envelope) -> Result<()> {
        self.records
            .entry(collection)
            .or_default()
            .insert(envelope.id.clone(), envelope.clone());
        Ok(())
    }

    fn list(&self, collection: Collection) -> Result<Vec<Envelope>> {
        let mut envelopes: Vec<Envelope> = self
            .records
            .get(&collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        envelopes.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(envelopes)
    }

    fn delete(&mut self, collection: Collection, id: &RecordId) -> Result<bool> {
        Ok(self
            .records
            .get_mut(&collection)
            .and_then(|records| records.remove(id))
            .is_some())
    }

    fn count(&self, collection: Collection) -> Result<u64> {
        let count = self.records.get(&collection).map_or(0, BTreeMap::len);
        Ok(count as u64)
    }

    fn enqueue(&mut self, entry: &MutationEntry) -> Result<()> {
        if self.queue.iter().any(|queued| queued.id == entry.id) {
            return Err(Error::InvalidInput(format!(
                "Queue entry {} already exists",
                entry.id
            )));
        }
        self.queue.push(entry.clone());
        Ok(())
    }

    fn mutations(&self, status: Option<MutationStatus>) -> Result<Vec<MutationEntry>> {
        Ok(self
            .queue
            .iter()
            .filter(|entry| status.is_none_or(|status| entry.status == status))
            .cloned()
            .collect())
    }

    fn set_mutation_status(
        &mut self,
        id: &MutationId,
        status: MutationStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let entry = self
            .queue
            .iter_mut()
            .find(|entry| &entry.id == id)
            .ok_or_else(|| Error::NotFound(format!("queue entry {id}")))?;
        entry.set_status(status, error.map(str::to_string));
        Ok(())
    }

    fn purge_synced(&mut self) -> Result<usize> {
        let before = self.queue.len();
        self.queue
            .retain(|entry| entry.status != MutationStatus::Synced);
        Ok(before - self.queue.len())
    }

    fn requeue_failed(&mut self) -> Result<usize> {
        let mut requeued = 0;
        for entry in &mut self.queue {
            if entry.status == MutationStatus::Error {
                entry.set_status(MutationStatus::Pending, None);
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    fn count_mutations(&self, status: MutationStatus) -> Result<u64> {
        let count = self
            .queue
            .iter()
            .filter(|entry| entry.status == status)
            .count();
        Ok(count as u64)
    }

    fn load_metadata(&self) -> Result<Option<SyncMetadata>> {
        Ok(self.metadata.clone())
    }

    fn save_metadata(&mut self, metadata: &SyncMetadata) -> Result<()> {
        self.metadata = Some(metadata.clone());
        Ok(())
    }
}
