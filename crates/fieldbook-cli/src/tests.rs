use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use fieldbook_core::{
    Collection, Envelope, LocalStore, MutationAction, MutationEntry, MutationStatus, RecordService,
    RemoteConfig, SyncResult, SyncStatus,
};
use fieldbook_core::sync::SyncIssue;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::cli::{CollectionArg, CompletionShell};
use crate::commands::common::{
    format_queue_lines, format_relative_time, format_sync_timestamp, normalize_record_id,
    parse_payload, payload_preview, remote_target, RemoteTarget,
};
use crate::commands::completions::render_completions;
use crate::commands::queue::run_queue_purge;
use crate::commands::records::{run_add, run_delete, run_update};
use crate::commands::sync::{format_status_report, format_sync_result, SyncStatusReport};
use crate::config_profiles::{CliProfile, RemoteKind};
use crate::error::CliError;

#[test]
fn parse_payload_requires_a_json_object() {
    assert_eq!(
        parse_payload(r#" {"name": "Warehouse 3"} "#).unwrap(),
        json!({"name": "Warehouse 3"})
    );
    assert!(matches!(parse_payload("   "), Err(CliError::EmptyPayload)));
    assert!(matches!(
        parse_payload("[1, 2]"),
        Err(CliError::InvalidPayload(_))
    ));
    assert!(matches!(
        parse_payload("{not json"),
        Err(CliError::InvalidPayload(_))
    ));
}

#[test]
fn normalize_record_id_rejects_empty_and_slashes() {
    assert!(matches!(
        normalize_record_id(" \n "),
        Err(CliError::EmptyRecordId)
    ));
    assert!(matches!(normalize_record_id("a/b"), Err(CliError::Core(_))));
    assert_eq!(normalize_record_id("  abc123  ").unwrap().as_str(), "abc123");
}

#[test]
fn collection_argument_maps_to_core_collection() {
    assert_eq!(Collection::from(CollectionArg::Objects), Collection::Objects);
    assert_eq!(
        Collection::from(CollectionArg::Violations),
        Collection::Violations
    );
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn payload_preview_truncates_with_ellipsis() {
    let preview = payload_preview(&json!({"note": "a very long inspection remark"}), 20);
    assert_eq!(preview.chars().count(), 20);
    assert!(preview.ends_with("..."));
    assert_eq!(payload_preview(&json!({"a": 1}), 20), r#"{"a":1}"#);
}

#[test]
fn format_sync_timestamp_returns_utc_label() {
    let epoch = Utc.timestamp_opt(0, 0).unwrap();
    assert_eq!(format_sync_timestamp(epoch), "1970-01-01 00:00:00 UTC");
}

#[test]
fn queue_lines_include_status_action_and_error() {
    let mut failed = MutationEntry::new(MutationAction::Update, "objects/obj-1.json", None);
    failed.set_status(MutationStatus::Error, Some("HTTP 503".to_string()));
    let pending = MutationEntry::new(MutationAction::Delete, "eq/eq-2.json", None);

    let lines = format_queue_lines(&[failed, pending]);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("error"));
    assert!(lines[0].contains("update"));
    assert!(lines[0].ends_with("(HTTP 503)"));
    assert!(lines[1].contains("pending"));
    assert!(lines[1].ends_with("eq/eq-2.json"));
}

#[test]
fn sync_result_lines_list_each_issue() {
    let mut result = SyncResult::new(SyncStatus::Error);
    result.uploaded = 2;
    result.errors.push(SyncIssue::at("objects/obj-9.json", "HTTP 500"));

    let lines = format_sync_result(&result);
    assert_eq!(lines[0], "Sync error: uploaded 2, downloaded 0");
    assert_eq!(lines[1], "  error: objects/obj-9.json: HTTP 500");

    let offline = format_sync_result(&SyncResult::new(SyncStatus::LocalOnly));
    assert_eq!(offline.len(), 1);
    assert!(offline[0].contains("fieldbook auth url"));
}

#[test]
fn status_report_without_metadata_says_never() {
    let report = SyncStatusReport {
        last_sync_at: None,
        files_synced: None,
        pending: 3,
        failed: 1,
        synced: 0,
        records: [("objects".to_string(), 4)].into_iter().collect(),
        degraded: false,
    };
    let lines = format_status_report(&report);
    assert_eq!(lines[0], "Last sync: never");
    assert_eq!(lines[1], "Queue: 3 pending, 1 failed, 0 delivered");
}

#[test]
fn remote_target_prefers_profile_then_environment() {
    let env_config = RemoteConfig::new("env-client", "EnvFolder").unwrap();

    assert_eq!(remote_target(None, None).unwrap(), None);
    assert_eq!(
        remote_target(None, Some(env_config.clone())).unwrap(),
        Some(RemoteTarget::Yandex(env_config.clone()))
    );

    let incomplete = CliProfile {
        client_id: Some("profile-client".to_string()),
        ..CliProfile::default()
    };
    assert_eq!(
        remote_target(Some(&incomplete), Some(env_config.clone())).unwrap(),
        Some(RemoteTarget::Yandex(env_config))
    );

    let complete = CliProfile {
        client_id: Some("profile-client".to_string()),
        root_folder: Some("InspectionApp".to_string()),
        ..CliProfile::default()
    };
    match remote_target(Some(&complete), None).unwrap() {
        Some(RemoteTarget::Yandex(config)) => assert_eq!(config.client_id, "profile-client"),
        other => panic!("unexpected target: {other:?}"),
    }
}

#[test]
fn local_dir_profile_targets_root_folder_inside_directory() {
    let profile = CliProfile {
        remote: Some(RemoteKind::LocalDir),
        local_dir: Some(PathBuf::from("/mnt/share")),
        root_folder: Some("InspectionApp".to_string()),
        ..CliProfile::default()
    };
    assert_eq!(
        remote_target(Some(&profile), None).unwrap(),
        Some(RemoteTarget::LocalDir(PathBuf::from("/mnt/share/InspectionApp")))
    );

    let missing_dir = CliProfile {
        remote: Some(RemoteKind::LocalDir),
        ..CliProfile::default()
    };
    assert!(matches!(
        remote_target(Some(&missing_dir), None),
        Err(CliError::Config(_))
    ));
}

#[test]
fn completions_use_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("fieldbook"));
}

#[tokio::test(flavor = "multi_thread")]
async fn record_commands_write_through_to_store_and_queue() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("fieldbook.db");

    run_add(
        Collection::Equipment,
        Some(r#"{"name": "Fire extinguisher"}"#),
        &db_path,
    )
    .await
    .unwrap();

    let store = LocalStore::open(&db_path);
    let records: Vec<Envelope> = RecordService::new(store.clone(), Collection::Equipment)
        .list()
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    let id = records[0].id.to_string();

    run_update(
        Collection::Equipment,
        &id,
        Some(r#"{"name": "Fire extinguisher", "checked": true}"#),
        &db_path,
    )
    .await
    .unwrap();
    run_delete(Collection::Equipment, &id, &db_path).await.unwrap();

    let queue = store.pending_mutations().await.unwrap();
    let actions = queue.iter().map(|entry| entry.action).collect::<Vec<_>>();
    assert_eq!(
        actions,
        vec![
            MutationAction::Create,
            MutationAction::Update,
            MutationAction::Delete
        ]
    );

    let missing = run_delete(Collection::Equipment, &id, &db_path).await;
    assert!(matches!(missing, Err(CliError::Core(error)) if error.is_not_found()));
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_purge_removes_only_delivered_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("fieldbook.db");
    let store = LocalStore::open(&db_path);

    let delivered = store
        .enqueue_mutation(MutationAction::Delete, "objects/obj-1.json", None)
        .await
        .unwrap();
    store
        .enqueue_mutation(MutationAction::Delete, "objects/obj-2.json", None)
        .await
        .unwrap();
    store
        .mark_mutation(&delivered, MutationStatus::Synced, None)
        .await
        .unwrap();

    run_queue_purge(&db_path).await.unwrap();

    let remaining = store.list_mutations(None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].path, "objects/obj-2.json");
}
