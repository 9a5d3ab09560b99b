use std::path::Path;

use fieldbook_core::MutationStatus;

use crate::cli::QueueCommands;
use crate::commands::common::{format_queue_lines, open_store, queue_entry_to_item, QueueItem};
use crate::error::CliError;

pub async fn run_queue(command: QueueCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        QueueCommands::List { all, json } => run_queue_list(all, json, db_path).await,
        QueueCommands::Purge => run_queue_purge(db_path).await,
    }
}

pub async fn run_queue_list(include_synced: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path);
    let entries = store
        .list_mutations(None)
        .await?
        .into_iter()
        .filter(|entry| include_synced || entry.status != MutationStatus::Synced)
        .collect::<Vec<_>>();

    if as_json {
        let json_items = entries
            .iter()
            .map(queue_entry_to_item)
            .collect::<Vec<QueueItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Mutation queue is empty.");
        return Ok(());
    }
    for line in format_queue_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_queue_purge(db_path: &Path) -> Result<(), CliError> {
    let removed = open_store(db_path).purge_synced_mutations().await?;
    println!("Removed {removed} delivered entries");
    Ok(())
}
