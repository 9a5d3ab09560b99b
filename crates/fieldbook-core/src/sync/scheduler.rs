//! Periodic sync driver

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{SyncOrchestrator, SyncStatus};
use crate::error::{Error, Result};

pub const DEFAULT_AUTO_SYNC_INTERVAL: Duration = Duration::from_millis(30_000);

/// Running auto-sync loop. Dropping the handle stops it.
#[derive(Debug)]
pub struct AutoSyncHandle {
    task: JoinHandle<()>,
    interval: Duration,
}

impl AutoSyncHandle {
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop issuing passes. A pass already in flight runs to completion.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for AutoSyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl SyncOrchestrator {
    /// Request a pass every `interval`. The first pass fires after one full interval.
    pub fn start_auto_sync(self: &Arc<Self>, interval: Duration) -> Result<AutoSyncHandle> {
        if interval.is_zero() {
            return Err(Error::InvalidInput(
                "Auto-sync interval must be greater than zero".to_string(),
            ));
        }

        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                // Run the pass on its own task so stopping the loop never cuts one short
                let pass = tokio::spawn({
                    let orchestrator = Arc::clone(&orchestrator);
                    async move { orchestrator.sync().await }
                });
                match pass.await {
                    Ok(result) if result.status == SyncStatus::AlreadySyncing => {
                        tracing::debug!("Auto-sync tick skipped; a pass is running");
                    }
                    Ok(result) => {
                        tracing::debug!("Auto-sync tick finished: {}", result.status);
                    }
                    Err(error) => tracing::error!("Auto-sync pass panicked: {}", error),
                }
            }
        });

        tracing::info!("Auto-sync started every {:?}", interval);
        Ok(AutoSyncHandle { task, interval })
    }
}
