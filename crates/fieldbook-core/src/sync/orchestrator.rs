//! One synchronization pass: push the mutation queue, pull remote envelopes,
//! record metadata, and report status.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::listener::{ListenerId, ListenerRegistry, SyncListener};
use super::{SyncIssue, SyncResult, SyncStatus};
use crate::error::{Error, Result};
use crate::models::{
    Collection, Envelope, MutationAction, MutationEntry, MutationStatus, RecordId, SyncMetadata,
    SYNC_METADATA_PATH,
};
use crate::remote::RemoteStore;
use crate::store::LocalStore;
use crate::util::parent_folder;

const DEFAULT_METADATA_USER: &str = "current-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Collections pulled each pass
    pub collections: Vec<Collection>,
    /// Read the remote copy before each write and refuse to overwrite a newer version
    pub check_remote_version: bool,
    /// Recorded as `lastSyncUser` in the remote metadata file
    pub metadata_user: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            collections: Collection::ALL.to_vec(),
            check_remote_version: false,
            metadata_user: DEFAULT_METADATA_USER.to_string(),
        }
    }
}

/// Resets the single-pass flag on every exit path
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncOrchestrator {
    store: LocalStore,
    remote: Arc<dyn RemoteStore>,
    options: SyncOptions,
    syncing: AtomicBool,
    last_sync_at: Mutex<Option<DateTime<Utc>>>,
    listeners: ListenerRegistry,
}

impl SyncOrchestrator {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self::with_options(store, remote, SyncOptions::default())
    }

    pub fn with_options(
        store: LocalStore,
        remote: Arc<dyn RemoteStore>,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            remote,
            options,
            syncing: AtomicBool::new(false),
            last_sync_at: Mutex::new(None),
            listeners: ListenerRegistry::default(),
        }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Whether a pass is running right now
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Completion time of the last pass that reached the remote store
    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        *self
            .last_sync_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on_status_change(&self, listener: impl SyncListener + 'static) -> ListenerId {
        self.listeners.add(Arc::new(listener))
    }

    /// Unregister a listener; returns false if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Run one pass, or return `AlreadySyncing` at once if one is in flight.
    pub async fn sync(&self) -> SyncResult {
        let Some(_guard) = PassGuard::acquire(&self.syncing) else {
            tracing::debug!("Sync requested while a pass is running");
            return SyncResult::new(SyncStatus::AlreadySyncing);
        };

        let mut result = SyncResult::new(SyncStatus::Syncing);
        self.listeners.notify(SyncStatus::Syncing, &result);

        if !self.remote.is_authenticated().await {
            tracing::info!("Remote store not connected; working locally");
            result.status = SyncStatus::LocalOnly;
            self.listeners.notify(result.status, &result);
            return result;
        }

        self.run_pass(&mut result).await;
        result.finish();
        *self
            .last_sync_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        tracing::info!(
            "Sync finished: {} (uploaded {}, downloaded {}, errors {})",
            result.status,
            result.uploaded,
            result.downloaded,
            result.errors.len()
        );
        self.listeners.notify(result.status, &result);
        result
    }

    async fn run_pass(&self, result: &mut SyncResult) {
        if let Err(error) = self.remote.ensure_folder("").await {
            tracing::warn!("Could not ensure remote root folder: {}", error);
        }

        match self.store.requeue_failed_mutations().await {
            Ok(0) => {}
            Ok(count) => tracing::info!("Retrying {} previously failed queue entries", count),
            Err(error) => tracing::warn!("Could not requeue failed entries: {}", error),
        }

        self.push(result).await;
        self.pull(result).await;
        self.write_metadata(result).await;
    }

    async fn push(&self, result: &mut SyncResult) {
        let pending = match self.store.pending_mutations().await {
            Ok(pending) => pending,
            Err(error) => {
                result.record(SyncIssue::general(format!(
                    "Could not read the mutation queue: {error}"
                )));
                return;
            }
        };

        for entry in pending {
            match self.push_entry(&entry).await {
                Ok(()) => {
                    result.uploaded += 1;
                    if let Err(error) = self
                        .store
                        .mark_mutation(&entry.id, MutationStatus::Synced, None)
                        .await
                    {
                        result.record(SyncIssue::at(
                            &entry.path,
                            format!("Delivered but could not mark as synced: {error}"),
                        ));
                    }
                }
                Err(error) => {
                    let message = error.to_string();
                    if let Err(mark_error) = self
                        .store
                        .mark_mutation(&entry.id, MutationStatus::Error, Some(&message))
                        .await
                    {
                        tracing::warn!(
                            "Could not mark queue entry {} as failed: {}",
                            entry.id,
                            mark_error
                        );
                    }
                    result.record(SyncIssue::at(&entry.path, message));
                }
            }
        }
    }

    async fn push_entry(&self, entry: &MutationEntry) -> Result<()> {
        if let Some(folder) = parent_folder(&entry.path) {
            if let Err(error) = self.remote.ensure_folder(folder).await {
                tracing::debug!("Could not ensure folder {}: {}", folder, error);
            }
        }

        match entry.action {
            MutationAction::Delete => match self.remote.delete_file(&entry.path).await {
                Ok(()) | Err(Error::NotFound(_)) => {
                    tracing::debug!("Deleted remote {}", entry.path);
                    Ok(())
                }
                Err(error) => Err(error),
            },
            MutationAction::Create | MutationAction::Update => {
                let envelope = entry.payload.as_ref().ok_or_else(|| {
                    Error::InvalidInput(format!("Queue entry {} has no envelope", entry.id))
                })?;
                if self.options.check_remote_version {
                    self.check_remote_version(&entry.path, envelope).await?;
                }
                self.remote
                    .write_file(&entry.path, &envelope.to_vec_pretty()?)
                    .await?;
                tracing::debug!("Uploaded {} (v{})", entry.path, envelope.version);
                Ok(())
            }
        }
    }

    /// Refuse to overwrite a remote copy carrying a higher version.
    async fn check_remote_version(&self, path: &str, envelope: &Envelope) -> Result<()> {
        let bytes = match self.remote.read_file(path).await {
            Ok(bytes) => bytes,
            Err(Error::NotFound(_)) => return Ok(()),
            Err(error) => return Err(error),
        };

        match Envelope::from_slice(&bytes) {
            Ok(remote) if envelope.is_superseded_by(&remote) => Err(Error::Conflict(format!(
                "remote version is newer ({} > {})",
                remote.version, envelope.version
            ))),
            Ok(_) => Ok(()),
            Err(error) => {
                tracing::warn!("Overwriting unreadable remote copy of {}: {}", path, error);
                Ok(())
            }
        }
    }

    async fn pull(&self, result: &mut SyncResult) {
        let undelivered_deletes = self.undelivered_deletes().await;

        for &collection in &self.options.collections {
            let entries = match self.remote.list_files(collection.folder()).await {
                Ok(entries) => entries,
                Err(Error::NotFound(_)) => {
                    tracing::debug!("Remote folder {} does not exist yet", collection.folder());
                    continue;
                }
                Err(error) => {
                    result.record(SyncIssue::at(collection.folder(), error.to_string()));
                    continue;
                }
            };

            for entry in entries.into_iter().filter(|entry| entry.is_file()) {
                let Some(id) = collection.record_id_from_file_name(&entry.name) else {
                    tracing::debug!("Skipping foreign remote file {}", entry.path);
                    continue;
                };
                if undelivered_deletes.contains(&entry.path) {
                    tracing::debug!("Skipping {}: local delete not delivered yet", entry.path);
                    continue;
                }

                match self.pull_file(collection, &id, &entry.path).await {
                    Ok(true) => result.downloaded += 1,
                    Ok(false) => {}
                    Err(error) => result.record(SyncIssue::at(&entry.path, error.to_string())),
                }
            }
        }
    }

    /// Paths of queued deletes that have not reached the remote store.
    async fn undelivered_deletes(&self) -> HashSet<String> {
        match self.store.list_mutations(None).await {
            Ok(entries) => entries
                .into_iter()
                .filter(|entry| {
                    entry.action == MutationAction::Delete && entry.status != MutationStatus::Synced
                })
                .map(|entry| entry.path)
                .collect(),
            Err(error) => {
                tracing::warn!("Could not read queued deletes before pull: {}", error);
                HashSet::new()
            }
        }
    }

    /// Apply one remote envelope if it is newer. Returns whether the local copy changed.
    async fn pull_file(&self, collection: Collection, id: &RecordId, path: &str) -> Result<bool> {
        let bytes = self.remote.read_file(path).await?;
        let remote = Envelope::from_slice(&bytes)?;
        if &remote.id != id {
            return Err(Error::InvalidInput(format!(
                "file is named for record {id} but holds record {}",
                remote.id
            )));
        }

        let local = self.store.get(collection, id).await?;
        let newer = local
            .as_ref()
            .is_none_or(|local| local.is_superseded_by(&remote));
        if !newer {
            return Ok(false);
        }

        self.store.put(collection, &remote).await?;
        tracing::debug!("Downloaded {} (v{})", path, remote.version);
        Ok(true)
    }

    async fn write_metadata(&self, result: &SyncResult) {
        let pending_changes = match self.store.stats().await {
            Ok(stats) => stats.pending,
            Err(error) => {
                tracing::warn!("Could not count pending changes: {}", error);
                0
            }
        };
        let metadata = SyncMetadata {
            last_sync_at: Utc::now(),
            files_synced: result.files_synced(),
            pending_changes,
        };

        if let Err(error) = self.store.save_sync_metadata(&metadata).await {
            tracing::warn!("Failed to save sync metadata locally: {}", error);
        }

        if let Err(error) = self.write_remote_metadata(&metadata).await {
            tracing::warn!("Failed to update remote sync metadata: {}", error);
        }
    }

    async fn write_remote_metadata(&self, metadata: &SyncMetadata) -> Result<()> {
        if let Some(folder) = parent_folder(SYNC_METADATA_PATH) {
            if let Err(error) = self.remote.ensure_folder(folder).await {
                tracing::debug!("Could not ensure folder {}: {}", folder, error);
            }
        }
        let document = metadata.to_remote(&self.options.metadata_user);
        let bytes = serde_json::to_vec_pretty(&document)?;
        self.remote.write_file(SYNC_METADATA_PATH, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{RemoteEntry, RemoteKind};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet, HashSet};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// In-process remote with fault injection
    #[derive(Default)]
    struct FakeRemote {
        authenticated: AtomicBool,
        files: Mutex<BTreeMap<String, Vec<u8>>>,
        folders: Mutex<BTreeSet<String>>,
        failing_writes: Mutex<HashSet<String>>,
        failing_lists: Mutex<HashSet<String>>,
        failing_deletes: Mutex<HashSet<String>>,
        writes: Mutex<Vec<String>>,
        gate: Option<Semaphore>,
    }

    impl FakeRemote {
        fn online() -> Self {
            Self {
                authenticated: AtomicBool::new(true),
                ..Self::default()
            }
        }

        fn offline() -> Self {
            Self::default()
        }

        fn gated() -> Self {
            Self {
                authenticated: AtomicBool::new(true),
                gate: Some(Semaphore::new(0)),
                ..Self::default()
            }
        }

        fn put_envelope(&self, path: &str, envelope: &Envelope) {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), envelope.to_vec_pretty().unwrap());
        }

        fn envelope_at(&self, path: &str) -> Option<Envelope> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .map(|bytes| Envelope::from_slice(bytes).unwrap())
        }

        fn fail_writes_to(&self, path: &str) {
            self.failing_writes.lock().unwrap().insert(path.to_string());
        }

        fn fail_deletes_of(&self, path: &str) {
            self.failing_deletes.lock().unwrap().insert(path.to_string());
        }

        fn fail_listing_of(&self, folder: &str) {
            self.failing_lists.lock().unwrap().insert(folder.to_string());
        }

        fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn is_authenticated(&self) -> bool {
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            self.authenticated.load(Ordering::SeqCst)
        }

        async fn ensure_folder(&self, path: &str) -> Result<()> {
            self.folders.lock().unwrap().insert(path.to_string());
            Ok(())
        }

        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| Error::NotFound(path.to_string()))
        }

        async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
            if self.failing_writes.lock().unwrap().contains(path) {
                return Err(Error::Transport(format!("{path}: HTTP 503")));
            }
            self.writes.lock().unwrap().push(path.to_string());
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), contents.to_vec());
            Ok(())
        }

        async fn delete_file(&self, path: &str) -> Result<()> {
            if self.failing_deletes.lock().unwrap().contains(path) {
                return Err(Error::Transport(format!("{path}: HTTP 503")));
            }
            self.files.lock().unwrap().remove(path);
            Ok(())
        }

        async fn list_files(&self, path: &str) -> Result<Vec<RemoteEntry>> {
            if self.failing_lists.lock().unwrap().contains(path) {
                return Err(Error::Transport(format!("{path}: HTTP 500")));
            }
            let prefix = format!("{path}/");
            let files = self.files.lock().unwrap();
            let entries: Vec<RemoteEntry> = files
                .keys()
                .filter_map(|key| {
                    let name = key.strip_prefix(&prefix)?;
                    (!name.contains('/')).then(|| RemoteEntry {
                        name: name.to_string(),
                        path: key.clone(),
                        kind: RemoteKind::File,
                        size: None,
                    })
                })
                .collect();
            if entries.is_empty() && !self.folders.lock().unwrap().contains(path) {
                return Err(Error::NotFound(path.to_string()));
            }
            Ok(entries)
        }
    }

    fn orchestrator(remote: &Arc<FakeRemote>) -> SyncOrchestrator {
        let store = LocalStore::open_in_memory().unwrap();
        SyncOrchestrator::new(store, Arc::clone(remote) as Arc<dyn RemoteStore>)
    }

    fn envelope(id: &str, version: u64, payload: serde_json::Value) -> Envelope {
        let mut envelope = Envelope::with_id(id.parse().unwrap(), payload);
        envelope.version = version;
        envelope
    }

    async fn enqueue_create(store: &LocalStore, collection: Collection, envelope: &Envelope) {
        store.put(collection, envelope).await.unwrap();
        store
            .enqueue_mutation(
                MutationAction::Create,
                collection.record_path(&envelope.id),
                Some(envelope.clone()),
            )
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_pass_is_local_only_and_keeps_queue_pending() {
        let remote = Arc::new(FakeRemote::offline());
        let sync = orchestrator(&remote);
        enqueue_create(sync.store(), Collection::Objects, &envelope("r1", 1, json!({}))).await;

        let result = sync.sync().await;

        assert_eq!(result.status, SyncStatus::LocalOnly);
        assert_eq!((result.uploaded, result.downloaded), (0, 0));
        let pending = sync.store().pending_mutations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, MutationStatus::Pending);
        assert!(sync.last_sync_at().is_none());
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn online_pass_delivers_queued_create() {
        let remote = Arc::new(FakeRemote::online());
        let sync = orchestrator(&remote);
        let record = envelope("r1", 1, json!({"name": "Warehouse 3"}));
        enqueue_create(sync.store(), Collection::Objects, &record).await;

        let result = sync.sync().await;

        assert_eq!(result.status, SyncStatus::Success);
        assert_eq!(result.uploaded, 1);
        assert!(result.errors.is_empty());
        assert_eq!(remote.envelope_at("objects/obj-r1.json"), Some(record));

        let entries = sync.store().list_mutations(None).await.unwrap();
        assert_eq!(entries[0].status, MutationStatus::Synced);
        assert!(sync.last_sync_at().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pull_downloads_unknown_remote_record() {
        let remote = Arc::new(FakeRemote::online());
        remote.put_envelope("objects/obj-r2.json", &envelope("r2", 2, json!({"floors": 4})));
        let sync = orchestrator(&remote);

        let result = sync.sync().await;

        assert_eq!(result.status, SyncStatus::Success);
        assert_eq!(result.downloaded, 1);
        let local = sync
            .store()
            .get(Collection::Objects, &"r2".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(local.version, 2);
        assert_eq!(local.payload, json!({"floors": 4}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_failing_entry_does_not_abort_the_pass() {
        let remote = Arc::new(FakeRemote::online());
        remote.fail_writes_to("equipment/eq-bad.json");
        let sync = orchestrator(&remote);

        enqueue_create(sync.store(), Collection::Equipment, &envelope("ok1", 1, json!({}))).await;
        enqueue_create(sync.store(), Collection::Equipment, &envelope("bad", 1, json!({}))).await;
        enqueue_create(sync.store(), Collection::Equipment, &envelope("ok2", 1, json!({}))).await;

        let result = sync.sync().await;

        assert_eq!(result.status, SyncStatus::Error);
        assert_eq!(result.uploaded, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].path.as_deref(),
            Some("equipment/eq-bad.json")
        );

        let failed = sync
            .store()
            .list_mutations(Some(MutationStatus::Error))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].path, "equipment/eq-bad.json");
        assert!(failed[0].error.as_deref().is_some_and(|message| !message.is_empty()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleting_a_missing_remote_file_succeeds() {
        let remote = Arc::new(FakeRemote::online());
        let sync = orchestrator(&remote);
        sync.store()
            .enqueue_mutation(MutationAction::Delete, "objects/obj-gone.json", None)
            .await
            .unwrap();

        let result = sync.sync().await;

        assert_eq!(result.status, SyncStatus::Success);
        assert_eq!(result.uploaded, 1);
        assert!(sync.store().pending_mutations().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn undelivered_delete_keeps_record_from_being_pulled_back() {
        let remote = Arc::new(FakeRemote::online());
        remote.put_envelope("objects/obj-d1.json", &envelope("d1", 1, json!({})));
        remote.fail_deletes_of("objects/obj-d1.json");
        let sync = orchestrator(&remote);
        let id: RecordId = "d1".parse().unwrap();
        sync.store()
            .put(Collection::Objects, &envelope("d1", 1, json!({})))
            .await
            .unwrap();
        sync.store().delete(Collection::Objects, &id).await.unwrap();
        sync.store()
            .enqueue_mutation(MutationAction::Delete, "objects/obj-d1.json", None)
            .await
            .unwrap();

        let result = sync.sync().await;

        assert_eq!(result.status, SyncStatus::Error);
        assert_eq!(result.downloaded, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(sync.store().get(Collection::Objects, &id).await.unwrap(), None);

        remote.failing_deletes.lock().unwrap().clear();
        let result = sync.sync().await;

        assert_eq!(result.status, SyncStatus::Success);
        assert_eq!(result.uploaded, 1);
        assert!(remote.envelope_at("objects/obj-d1.json").is_none());
        assert_eq!(sync.store().get(Collection::Objects, &id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn newer_remote_version_replaces_local() {
        let remote = Arc::new(FakeRemote::online());
        let sync = orchestrator(&remote);
        sync.store()
            .put(Collection::Inspections, &envelope("x", 3, json!({"v": "local"})))
            .await
            .unwrap();
        remote.put_envelope("inspections/insp-x.json", &envelope("x", 5, json!({"v": "remote"})));

        let result = sync.sync().await;

        assert_eq!(result.downloaded, 1);
        let local = sync
            .store()
            .get(Collection::Inspections, &"x".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(local.version, 5);
        assert_eq!(local.payload, json!({"v": "remote"}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn older_or_equal_remote_version_is_ignored() {
        let remote = Arc::new(FakeRemote::online());
        let sync = orchestrator(&remote);
        let local = envelope("x", 5, json!({"v": "local"}));
        sync.store().put(Collection::Inspections, &local).await.unwrap();
        remote.put_envelope("inspections/insp-x.json", &envelope("x", 3, json!({"v": "remote"})));

        let result = sync.sync().await;
        assert_eq!(result.downloaded, 0);

        remote.put_envelope("inspections/insp-x.json", &envelope("x", 5, json!({"v": "same"})));
        let result = sync.sync().await;
        assert_eq!(result.downloaded, 0);

        assert_eq!(
            sync.store()
                .get(Collection::Inspections, &"x".parse().unwrap())
                .await
                .unwrap(),
            Some(local)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_requests_collapse_into_one_pass() {
        let remote = Arc::new(FakeRemote::gated());
        let sync = Arc::new(orchestrator(&remote));

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&statuses);
        sync.on_status_change(move |status: SyncStatus, _: &SyncResult| {
            seen.lock().unwrap().push(status);
        });

        let first = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.sync().await }
        });

        for _ in 0..200 {
            if sync.is_syncing() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(sync.is_syncing());

        let second = sync.sync().await;
        assert_eq!(second.status, SyncStatus::AlreadySyncing);
        assert_eq!((second.uploaded, second.downloaded), (0, 0));

        remote.gate.as_ref().unwrap().add_permits(1);
        let first = first.await.unwrap();
        assert_eq!(first.status, SyncStatus::Success);
        assert!(!sync.is_syncing());

        assert_eq!(
            *statuses.lock().unwrap(),
            vec![SyncStatus::Syncing, SyncStatus::Success]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_entries_are_retried_next_pass() {
        let remote = Arc::new(FakeRemote::online());
        remote.fail_writes_to("violations/viol-v1.json");
        let sync = orchestrator(&remote);
        enqueue_create(sync.store(), Collection::Violations, &envelope("v1", 1, json!({}))).await;

        assert_eq!(sync.sync().await.status, SyncStatus::Error);

        remote.failing_writes.lock().unwrap().clear();
        let result = sync.sync().await;
        assert_eq!(result.status, SyncStatus::Success);
        assert_eq!(result.uploaded, 1);
        assert!(remote.envelope_at("violations/viol-v1.json").is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn listing_failure_is_recorded_and_other_collections_still_pull() {
        let remote = Arc::new(FakeRemote::online());
        remote.fail_listing_of("objects");
        remote.put_envelope("equipment/eq-e1.json", &envelope("e1", 1, json!({})));
        let sync = orchestrator(&remote);

        let result = sync.sync().await;

        assert_eq!(result.status, SyncStatus::Error);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path.as_deref(), Some("objects"));
        assert_eq!(result.downloaded, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn foreign_files_are_skipped_and_mismatched_ids_reported() {
        let remote = Arc::new(FakeRemote::online());
        remote
            .files
            .lock()
            .unwrap()
            .insert("objects/readme.txt".to_string(), b"hello".to_vec());
        remote.put_envelope("objects/obj-a.json", &envelope("b", 1, json!({})));
        let sync = orchestrator(&remote);

        let result = sync.sync().await;

        assert_eq!(result.downloaded, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path.as_deref(), Some("objects/obj-a.json"));
        assert!(sync.store().list(Collection::Objects).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn metadata_is_written_locally_and_remotely() {
        let remote = Arc::new(FakeRemote::online());
        remote.fail_writes_to("objects/obj-stuck.json");
        let sync = orchestrator(&remote);
        enqueue_create(sync.store(), Collection::Objects, &envelope("fine", 1, json!({}))).await;
        enqueue_create(sync.store(), Collection::Objects, &envelope("stuck", 1, json!({}))).await;

        sync.sync().await;

        let local = sync.store().load_sync_metadata().await.unwrap().unwrap();
        assert_eq!(local.files_synced, 1);
        assert_eq!(local.pending_changes, 0);

        let document: serde_json::Value = serde_json::from_slice(
            &remote.read_file(SYNC_METADATA_PATH).await.unwrap(),
        )
        .unwrap();
        assert_eq!(document["filesSynced"], 1);
        assert_eq!(document["lastSyncUser"], "current-user");
        assert_eq!(document["version"], "1.0");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn version_check_refuses_to_overwrite_newer_remote() {
        let remote = Arc::new(FakeRemote::online());
        remote.put_envelope("objects/obj-c.json", &envelope("c", 7, json!({"v": "remote"})));
        let store = LocalStore::open_in_memory().unwrap();
        let options = SyncOptions {
            check_remote_version: true,
            ..SyncOptions::default()
        };
        let sync = SyncOrchestrator::with_options(
            store,
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            options,
        );
        sync.store()
            .enqueue_mutation(
                MutationAction::Update,
                "objects/obj-c.json",
                Some(envelope("c", 4, json!({"v": "local"}))),
            )
            .await
            .unwrap();

        let result = sync.sync().await;

        assert_eq!(result.status, SyncStatus::Error);
        assert_eq!(result.uploaded, 0);
        assert!(result.errors[0].message.contains("Conflict"));
        assert_eq!(remote.envelope_at("objects/obj-c.json").unwrap().version, 7);
        // The pull still brings the newer remote copy in
        assert_eq!(result.downloaded, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn listeners_see_syncing_then_terminal_status() {
        let remote = Arc::new(FakeRemote::offline());
        let sync = orchestrator(&remote);

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&statuses);
        let id = sync.on_status_change(move |status: SyncStatus, _: &SyncResult| {
            seen.lock().unwrap().push(status);
        });

        sync.sync().await;
        assert!(sync.remove_listener(id));
        sync.sync().await;

        assert_eq!(
            *statuses.lock().unwrap(),
            vec![SyncStatus::Syncing, SyncStatus::LocalOnly]
        );
    }
}
