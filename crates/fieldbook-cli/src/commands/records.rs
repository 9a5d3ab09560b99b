use std::path::Path;

use fieldbook_core::{Collection, RecordService};

use crate::commands::common::{
    format_record_lines, normalize_record_id, open_store, record_to_list_item, resolve_payload,
    RecordListItem,
};
use crate::error::CliError;

fn service(collection: Collection, db_path: &Path) -> RecordService {
    RecordService::new(open_store(db_path), collection)
}

pub async fn run_add(
    collection: Collection,
    json: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let payload = resolve_payload(json)?;
    let record = service(collection, db_path).create(payload).await?;
    println!("{}", record.id);
    Ok(())
}

pub async fn run_update(
    collection: Collection,
    id: &str,
    json: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let payload = resolve_payload(json)?;
    let record = service(collection, db_path).update(&id, payload).await?;
    println!("{} v{}", record.id, record.version);
    Ok(())
}

pub async fn run_delete(collection: Collection, id: &str, db_path: &Path) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    service(collection, db_path).delete(&id).await?;
    println!("{id}");
    Ok(())
}

pub async fn run_show(collection: Collection, id: &str, db_path: &Path) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let record = service(collection, db_path)
        .get(&id)
        .await?
        .ok_or_else(|| fieldbook_core::Error::NotFound(format!("{collection} {id}")))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

pub async fn run_list(collection: Collection, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let records = service(collection, db_path).list().await?;

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No {collection} recorded.");
        return Ok(());
    }
    for line in format_record_lines(&records) {
        println!("{line}");
    }
    Ok(())
}
