use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use fieldbook_core::{SyncOrchestrator, SyncResult, SyncStatus};
use serde::Serialize;

use crate::commands::common::{format_sync_timestamp, open_store, resolve_sync_setup};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncStatusReport {
    pub last_sync_at: Option<String>,
    pub files_synced: Option<u64>,
    pub pending: u64,
    pub failed: u64,
    pub synced: u64,
    pub records: BTreeMap<String, u64>,
    pub degraded: bool,
}

pub async fn run_sync(profile: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let setup = resolve_sync_setup(profile, None)?;
    let orchestrator =
        SyncOrchestrator::with_options(open_store(db_path), setup.remote, setup.options);

    let result = orchestrator.sync().await;
    for line in format_sync_result(&result) {
        println!("{line}");
    }
    finish(&result)
}

pub async fn run_sync_watch(
    profile: Option<&str>,
    interval_secs: Option<u64>,
    db_path: &Path,
) -> Result<(), CliError> {
    let setup = resolve_sync_setup(profile, interval_secs)?;
    let orchestrator = Arc::new(SyncOrchestrator::with_options(
        open_store(db_path),
        setup.remote,
        setup.options,
    ));
    orchestrator.on_status_change(|status: SyncStatus, result: &SyncResult| {
        if status.is_terminal() {
            for line in format_sync_result(result) {
                println!("{line}");
            }
        }
    });

    orchestrator.sync().await;
    let handle = orchestrator.start_auto_sync(setup.interval)?;
    println!(
        "Watching profile '{}' every {}s. Press Ctrl-C to stop.",
        setup.profile_name,
        setup.interval.as_secs()
    );

    tokio::signal::ctrl_c().await?;
    handle.stop();
    println!("Stopped.");
    Ok(())
}

pub async fn run_sync_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path);
    let metadata = store.load_sync_metadata().await?;
    let stats = store.stats().await?;

    let report = SyncStatusReport {
        last_sync_at: metadata
            .as_ref()
            .map(|metadata| format_sync_timestamp(metadata.last_sync_at)),
        files_synced: metadata.as_ref().map(|metadata| metadata.files_synced),
        pending: stats.pending,
        failed: stats.failed,
        synced: stats.synced,
        records: stats
            .records
            .iter()
            .map(|(collection, count)| (collection.to_string(), *count))
            .collect(),
        degraded: store.is_degraded(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_status_report(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_sync_result(result: &SyncResult) -> Vec<String> {
    let mut lines = Vec::new();
    match result.status {
        SyncStatus::LocalOnly => lines.push(
            "Remote store not connected; changes stay queued locally. Run `fieldbook auth url` to connect."
                .to_string(),
        ),
        SyncStatus::AlreadySyncing => lines.push("A sync pass is already running.".to_string()),
        SyncStatus::Syncing | SyncStatus::Success | SyncStatus::Error => lines.push(format!(
            "Sync {}: uploaded {}, downloaded {}",
            result.status, result.uploaded, result.downloaded
        )),
    }
    lines.extend(result.errors.iter().map(|issue| format!("  error: {issue}")));
    lines
}

pub fn format_status_report(report: &SyncStatusReport) -> Vec<String> {
    let mut lines = vec![match (&report.last_sync_at, report.files_synced) {
        (Some(at), Some(files)) => format!("Last sync: {at} ({files} files)"),
        _ => "Last sync: never".to_string(),
    }];
    lines.push(format!(
        "Queue: {} pending, {} failed, {} delivered",
        report.pending, report.failed, report.synced
    ));
    for (collection, count) in &report.records {
        lines.push(format!("  {collection:<12} {count}"));
    }
    if report.degraded {
        lines.push("Local database unavailable: running on the in-memory fallback".to_string());
    }
    lines
}

fn finish(result: &SyncResult) -> Result<(), CliError> {
    if result.status == SyncStatus::Error {
        Err(CliError::SyncFailed(result.errors.len()))
    } else {
        Ok(())
    }
}
