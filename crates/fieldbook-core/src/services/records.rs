//! Typed CRUD for one collection. Every mutation is written locally and
//! queued for delivery before the call returns.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{Collection, Envelope, MutationAction, RecordId};
use crate::store::LocalStore;

pub struct RecordService<T = serde_json::Value> {
    store: LocalStore,
    collection: Collection,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for RecordService<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection,
            _payload: PhantomData,
        }
    }
}

impl<T> RecordService<T>
where
    T: Serialize + DeserializeOwned,
{
    pub const fn new(store: LocalStore, collection: Collection) -> Self {
        Self {
            store,
            collection,
            _payload: PhantomData,
        }
    }

    pub const fn collection(&self) -> Collection {
        self.collection
    }

    pub async fn get(&self, id: &RecordId) -> Result<Option<Envelope<T>>> {
        self.store
            .get(self.collection, id)
            .await?
            .map(Envelope::into_typed::<T>)
            .transpose()
    }

    /// Records in creation order.
    pub async fn list(&self) -> Result<Vec<Envelope<T>>> {
        self.store
            .list(self.collection)
            .await?
            .into_iter()
            .map(Envelope::into_typed::<T>)
            .collect()
    }

    /// Store a new record at version 1 and queue its upload.
    pub async fn create(&self, payload: T) -> Result<Envelope<T>> {
        let envelope = Envelope::new(payload);
        self.write(MutationAction::Create, &envelope).await?;
        tracing::debug!("Created {} {}", self.collection, envelope.id);
        Ok(envelope)
    }

    /// Replace the payload of an existing record, bumping its version.
    pub async fn update(&self, id: &RecordId, payload: T) -> Result<Envelope<T>> {
        let mut envelope = self
            .get(id)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        envelope.apply_update(payload);
        self.write(MutationAction::Update, &envelope).await?;
        tracing::debug!(
            "Updated {} {} to v{}",
            self.collection,
            envelope.id,
            envelope.version
        );
        Ok(envelope)
    }

    pub async fn delete(&self, id: &RecordId) -> Result<()> {
        if !self.store.delete(self.collection, id).await? {
            return Err(self.not_found(id));
        }
        self.store
            .enqueue_mutation(
                MutationAction::Delete,
                self.collection.record_path(id),
                None,
            )
            .await?;
        tracing::debug!("Deleted {} {}", self.collection, id);
        Ok(())
    }

    async fn write(&self, action: MutationAction, envelope: &Envelope<T>) -> Result<()> {
        let stored = envelope.to_value()?;
        self.store.put(self.collection, &stored).await?;
        self.store
            .enqueue_mutation(action, self.collection.record_path(&stored.id), Some(stored))
            .await?;
        Ok(())
    }

    fn not_found(&self, id: &RecordId) -> Error {
        Error::NotFound(format!("{} {id}", self.collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MutationStatus;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Inspection {
        object: String,
        passed: bool,
    }

    fn service() -> RecordService<Inspection> {
        let store = LocalStore::open_in_memory().unwrap();
        RecordService::new(store, Collection::Inspections)
    }

    fn inspection(passed: bool) -> Inspection {
        Inspection {
            object: "Boiler room".to_string(),
            passed,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_stores_and_queues_version_one() {
        let service = service();
        let created = service.create(inspection(false)).await.unwrap();

        assert_eq!(created.version, 1);
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(service.get(&created.id).await.unwrap(), Some(created.clone()));

        let queue = service.store.pending_mutations().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].action, MutationAction::Create);
        assert_eq!(
            queue[0].path,
            format!("inspections/insp-{}.json", created.id)
        );
        assert_eq!(queue[0].payload.as_ref().unwrap().version, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_bumps_version_and_queues_snapshot() {
        let service = service();
        let created = service.create(inspection(false)).await.unwrap();

        let updated = service.update(&created.id, inspection(true)).await.unwrap();
        assert_eq!(updated.version, 2);
        assert!(updated.payload.passed);
        assert!(updated.updated_at >= created.updated_at);

        let queue = service.store.pending_mutations().await.unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[1].action, MutationAction::Update);
        assert_eq!(queue[1].payload.as_ref().unwrap().version, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_removes_locally_and_queues_without_payload() {
        let service = service();
        let created = service.create(inspection(true)).await.unwrap();

        service.delete(&created.id).await.unwrap();

        assert_eq!(service.get(&created.id).await.unwrap(), None);
        let queue = service
            .store
            .list_mutations(Some(MutationStatus::Pending))
            .await
            .unwrap();
        assert_eq!(queue.last().unwrap().action, MutationAction::Delete);
        assert!(queue.last().unwrap().payload.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_records_are_not_found() {
        let service = service();
        let id: RecordId = "ghost".parse().unwrap();

        assert!(service
            .update(&id, inspection(true))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(service.delete(&id).await.unwrap_err().is_not_found());
        assert!(service.store.pending_mutations().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_returns_typed_payloads() {
        let service = service();
        service.create(inspection(true)).await.unwrap();
        service.create(inspection(false)).await.unwrap();

        let listed = service.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|record| record.payload.object == "Boiler room"));
    }
}
