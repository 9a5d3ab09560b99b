//! Local store: durable envelopes, the mutation queue, and sync metadata.
//!
//! `SQLite` is the primary medium. When it cannot be opened, or turns out to
//! be corrupted and cannot be reopened, the store switches to an in-process
//! map and keeps serving every operation without durability.

mod backend;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

pub use backend::{MemoryBackend, StoreBackend};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    Collection, Envelope, MutationAction, MutationEntry, MutationId, MutationStatus, RecordId,
    SyncMetadata,
};

/// Record counts and queue depths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub records: BTreeMap<Collection, u64>,
    pub pending: u64,
    pub failed: u64,
    pub synced: u64,
}

/// Thread-safe handle to the local store. Clones share the same medium.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<Mutex<Box<dyn StoreBackend>>>,
    db_path: Option<PathBuf>,
    degraded: Arc<AtomicBool>,
    /// Bumped every time the backend is replaced
    generation: Arc<AtomicU64>,
}

impl LocalStore {
    /// Open the store at `db_path`, falling back to memory if the file is unusable.
    pub fn open(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        match Self::open_database(&db_path) {
            Ok(db) => Self::with_backend(Box::new(db), Some(db_path), false),
            Err(error) => {
                tracing::warn!(
                    "Local database at {} is unavailable ({}); running on the in-memory fallback",
                    db_path.display(),
                    error
                );
                Self::with_backend(Box::new(MemoryBackend::new()), Some(db_path), true)
            }
        }
    }

    /// Open a store backed by an in-memory `SQLite` database (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::with_backend(Box::new(db), None, false))
    }

    fn with_backend(backend: Box<dyn StoreBackend>, db_path: Option<PathBuf>, degraded: bool) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            db_path,
            degraded: Arc::new(AtomicBool::new(degraded)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn open_database(db_path: &Path) -> Result<Database> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match Database::open(db_path) {
            Ok(db) => Ok(db),
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is corrupted: {}. Quarantining and starting fresh.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(db_path)?;
                Database::open(db_path)
            }
            Err(error) => Err(error),
        }
    }

    /// Path of the database file, if the store was opened on one
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Whether the store is running on the in-memory fallback
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn is_corrupted_db_error(error: &Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database")
            || message.contains("database disk image is malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("fieldbook.db");
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale database sidecar {}", path.display());
            }
        }

        Ok(())
    }

    /// Replace a corrupted primary medium, degrading to memory if it cannot be reopened.
    ///
    /// `failed_generation` identifies the backend that reported the corruption;
    /// if another caller already replaced it, nothing is done.
    async fn recover_from_corruption(&self, failed_generation: u64) {
        let mut backend = self.backend.lock().await;
        if self.generation.load(Ordering::SeqCst) != failed_generation {
            tracing::debug!("Local database was already replaced; retrying on the new one");
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        let Some(db_path) = self.db_path.clone() else {
            tracing::warn!("In-memory database reported corruption; switching to the map store");
            *backend = Box::new(MemoryBackend::new());
            self.degraded.store(true, Ordering::SeqCst);
            return;
        };

        tracing::warn!(
            "Detected invalid local DB file; attempting to reopen connection at {}",
            db_path.display()
        );
        // Drop the old connection before touching its files
        *backend = Box::new(MemoryBackend::new());

        let reopened = Self::quarantine_corrupted_db_files(&db_path)
            .and_then(|()| Database::open(&db_path));
        match reopened {
            Ok(db) => {
                *backend = Box::new(db);
                self.degraded.store(false, Ordering::SeqCst);
            }
            Err(error) => {
                tracing::warn!(
                    "Could not reopen local database ({}); running on the in-memory fallback",
                    error
                );
                self.degraded.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Run one backend operation, recovering once from corruption.
    async fn run<T>(&self, op: impl Fn(&mut dyn StoreBackend) -> Result<T>) -> Result<T> {
        let (first_attempt, generation) = {
            let mut backend = self.backend.lock().await;
            (op(&mut **backend), self.generation.load(Ordering::SeqCst))
        };

        let result = match first_attempt {
            Err(error) if Self::is_corrupted_db_error(&error) => {
                self.recover_from_corruption(generation).await;
                let mut backend = self.backend.lock().await;
                op(&mut **backend)
            }
            other => other,
        };

        result.map_err(|error| match error {
            Error::Sqlite(error) => Error::Storage(error.to_string()),
            other => other,
        })
    }

    /// Get an envelope; `None` only when the record does not exist.
    pub async fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Envelope>> {
        self.run(|backend| backend.get(collection, id)).await
    }

    /// Insert or replace an envelope by id.
    pub async fn put(&self, collection: Collection, envelope: &Envelope) -> Result<()> {
        self.run(|backend| backend.put(collection, envelope)).await
    }

    pub async fn list(&self, collection: Collection) -> Result<Vec<Envelope>> {
        self.run(|backend| backend.list(collection)).await
    }

    /// Delete an envelope, returning whether it existed.
    pub async fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool> {
        self.run(|backend| backend.delete(collection, id)).await
    }

    /// Append a `pending` entry to the mutation queue. Persisted before returning.
    pub async fn enqueue_mutation(
        &self,
        action: MutationAction,
        path: impl Into<String>,
        payload: Option<Envelope>,
    ) -> Result<MutationId> {
        let entry = MutationEntry::new(action, path, payload);
        self.run(|backend| backend.enqueue(&entry)).await?;
        tracing::debug!("Queued {} for {}", entry.action, entry.path);
        Ok(entry.id)
    }

    /// Entries with status `pending`, in queue order.
    pub async fn pending_mutations(&self) -> Result<Vec<MutationEntry>> {
        self.list_mutations(Some(MutationStatus::Pending)).await
    }

    /// Entries in queue order, optionally filtered by status.
    pub async fn list_mutations(
        &self,
        status: Option<MutationStatus>,
    ) -> Result<Vec<MutationEntry>> {
        self.run(|backend| backend.mutations(status)).await
    }

    pub async fn mark_mutation(
        &self,
        id: &MutationId,
        status: MutationStatus,
        error: Option<&str>,
    ) -> Result<()> {
        self.run(|backend| backend.set_mutation_status(id, status, error))
            .await
    }

    /// Delete entries already `synced`. `pending` and `error` entries are kept.
    pub async fn purge_synced_mutations(&self) -> Result<usize> {
        self.run(|backend| backend.purge_synced()).await
    }

    /// Make every `error` entry eligible for delivery again.
    pub async fn requeue_failed_mutations(&self) -> Result<usize> {
        self.run(|backend| backend.requeue_failed()).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.run(|backend| {
            let mut records = BTreeMap::new();
            for collection in Collection::ALL {
                records.insert(collection, backend.count(collection)?);
            }
            Ok(StoreStats {
                records,
                pending: backend.count_mutations(MutationStatus::Pending)?,
                failed: backend.count_mutations(MutationStatus::Error)?,
                synced: backend.count_mutations(MutationStatus::Synced)?,
            })
        })
        .await
    }

    pub async fn load_sync_metadata(&self) -> Result<Option<SyncMetadata>> {
        self.run(|backend| backend.load_metadata()).await
    }

    pub async fn save_sync_metadata(&self, metadata: &SyncMetadata) -> Result<()> {
        self.run(|backend| backend.save_metadata(metadata)).await
    }
}
