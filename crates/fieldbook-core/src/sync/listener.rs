//! Status listeners

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{SyncResult, SyncStatus};

/// Receives every status transition of a pass. Called on the pass task; must not block.
pub trait SyncListener: Send + Sync {
    fn on_status_change(&self, status: SyncStatus, result: &SyncResult);
}

impl<F> SyncListener for F
where
    F: Fn(SyncStatus, &SyncResult) + Send + Sync,
{
    fn on_status_change(&self, status: SyncStatus, result: &SyncResult) {
        self(status, result);
    }
}

/// Handle returned on registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn SyncListener>)>>,
}

impl ListenerRegistry {
    pub fn add(&self, listener: Arc<dyn SyncListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    pub fn notify(&self, status: SyncStatus, result: &SyncResult) {
        // Snapshot so listeners may (un)register from inside the callback
        let snapshot: Vec<Arc<dyn SyncListener>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener.on_status_change(status, result);
        }
    }
}
