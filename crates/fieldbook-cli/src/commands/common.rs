use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fieldbook_core::sync::DEFAULT_AUTO_SYNC_INTERVAL;
use fieldbook_core::{
    Envelope, LocalDirStore, LocalStore, MutationEntry, RecordId, RemoteConfig, RemoteStore,
    SyncOptions, YandexDiskStore,
};
use serde::Serialize;
use serde_json::Value;

use crate::auth::authenticator_for_profile;
use crate::config_profiles::{CliProfile, CliProfilesConfig, RemoteKind};
use crate::error::CliError;

const DB_PATH_ENV_VAR: &str = "FIELDBOOK_DB_PATH";

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub version: u64,
    pub created_at: String,
    pub updated_at: String,
    pub relative_time: String,
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct QueueItem {
    pub id: String,
    pub action: String,
    pub path: String,
    pub status: String,
    pub version: Option<u64>,
    pub created_at: String,
    pub error: Option<String>,
}

/// Where a profile's records are replicated to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteTarget {
    Yandex(RemoteConfig),
    LocalDir(PathBuf),
}

/// Everything `sync` needs for one profile
pub struct SyncSetup {
    pub profile_name: String,
    pub remote: Arc<dyn RemoteStore>,
    pub options: SyncOptions,
    pub interval: Duration,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV_VAR).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("fieldbook").join("fieldbook.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn open_store(path: &Path) -> LocalStore {
    let store = LocalStore::open(path);
    if store.is_degraded() {
        eprintln!(
            "Warning: local database at {} is unavailable; changes made now will not survive this run.",
            path.display()
        );
    }
    store
}

pub fn normalize_record_id(id: &str) -> Result<RecordId, CliError> {
    if id.trim().is_empty() {
        return Err(CliError::EmptyRecordId);
    }
    Ok(id.parse()?)
}

/// Payload from the argument, or piped stdin when the argument is absent.
pub fn resolve_payload(json: Option<&str>) -> Result<Value, CliError> {
    if let Some(raw) = json {
        return parse_payload(raw);
    }
    match read_piped_stdin()? {
        Some(raw) => parse_payload(&raw),
        None => Err(CliError::EmptyPayload),
    }
}

pub fn parse_payload(raw: &str) -> Result<Value, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyPayload);
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|error| CliError::InvalidPayload(error.to_string()))?;
    if !value.is_object() {
        return Err(CliError::InvalidPayload("expected a JSON object".to_string()));
    }
    Ok(value)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Pick the remote for a profile. Profiles win; `FIELDBOOK_*` variables fill in
/// for a missing or incomplete `yandex` profile.
pub fn remote_target(
    profile: Option<&CliProfile>,
    env_config: Option<RemoteConfig>,
) -> Result<Option<RemoteTarget>, CliError> {
    let Some(profile) = profile else {
        return Ok(env_config.map(RemoteTarget::Yandex));
    };

    match profile.remote_kind() {
        RemoteKind::LocalDir => {
            let Some(dir) = profile.local_dir.clone() else {
                return Err(CliError::Config(
                    "Profile uses a local-dir remote but has no local_dir".to_string(),
                ));
            };
            let dir = match &profile.root_folder {
                Some(folder) => dir.join(folder),
                None => dir,
            };
            Ok(Some(RemoteTarget::LocalDir(dir)))
        }
        RemoteKind::Yandex => Ok(profile
            .remote_config()?
            .or(env_config)
            .map(RemoteTarget::Yandex)),
    }
}

pub fn build_remote(
    profile_name: &str,
    target: RemoteTarget,
) -> Result<Arc<dyn RemoteStore>, CliError> {
    match target {
        RemoteTarget::LocalDir(dir) => {
            tracing::info!("Using local directory remote at {}", dir.display());
            Ok(Arc::new(LocalDirStore::new(dir)))
        }
        RemoteTarget::Yandex(config) => {
            let auth = Arc::new(authenticator_for_profile(profile_name, &config)?);
            Ok(Arc::new(YandexDiskStore::new(&config, auth)?))
        }
    }
}

pub fn resolve_sync_setup(
    explicit_profile: Option<&str>,
    interval_override: Option<u64>,
) -> Result<SyncSetup, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(explicit_profile);
    let profile = config.profile(&profile_name);

    let target = remote_target(profile, RemoteConfig::from_env()?)?
        .ok_or(CliError::RemoteNotConfigured)?;
    let remote = build_remote(&profile_name, target)?;

    let options = SyncOptions {
        check_remote_version: profile.is_some_and(CliProfile::checks_remote_version),
        ..SyncOptions::default()
    };
    let interval = interval_override
        .or_else(|| profile.and_then(|profile| profile.sync_interval_secs))
        .map_or(DEFAULT_AUTO_SYNC_INTERVAL, Duration::from_secs);

    Ok(SyncSetup {
        profile_name,
        remote,
        options,
        interval,
    })
}

/// Remote provider config for auth commands; local-dir profiles need none.
pub fn resolve_remote_config(
    config: &CliProfilesConfig,
    profile_name: &str,
) -> Result<RemoteConfig, CliError> {
    match remote_target(config.profile(profile_name), RemoteConfig::from_env()?)? {
        Some(RemoteTarget::Yandex(remote_config)) => Ok(remote_config),
        Some(RemoteTarget::LocalDir(_)) => Err(CliError::Config(format!(
            "Profile '{profile_name}' uses a local directory remote; no authorization is needed."
        ))),
        None => Err(CliError::RemoteNotConfigured),
    }
}

pub fn format_record_lines(records: &[Envelope]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    records
        .iter()
        .map(|record| {
            let id = record.id.to_string();
            let version = format!("v{}", record.version);
            let relative_time = format_relative_time(record.updated_at.timestamp_millis(), now_ms);
            let preview = payload_preview(&record.payload, 48);
            format!("{id:<36}  {version:<4}  {relative_time:<10}  {preview}")
        })
        .collect()
}

pub fn record_to_list_item(record: &Envelope) -> RecordListItem {
    let now_ms = Utc::now().timestamp_millis();
    RecordListItem {
        id: record.id.to_string(),
        version: record.version,
        created_at: record.created_at.to_rfc3339(),
        updated_at: record.updated_at.to_rfc3339(),
        relative_time: format_relative_time(record.updated_at.timestamp_millis(), now_ms),
        data: record.payload.clone(),
    }
}

pub fn queue_entry_to_item(entry: &MutationEntry) -> QueueItem {
    QueueItem {
        id: entry.id.to_string(),
        action: entry.action.as_str().to_string(),
        path: entry.path.clone(),
        status: entry.status.as_str().to_string(),
        version: entry.payload.as_ref().map(|payload| payload.version),
        created_at: entry.created_at.to_rfc3339(),
        error: entry.error.clone(),
    }
}

pub fn format_queue_lines(entries: &[MutationEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let line = format!(
                "{}  {:<7}  {:<6}  {}",
                format_sync_timestamp(entry.created_at),
                entry.status.as_str(),
                entry.action.as_str(),
                entry.path
            );
            match &entry.error {
                Some(error) => format!("{line}  ({error})"),
                None => line,
            }
        })
        .collect()
}

/// Compact single-line JSON, truncated with an ellipsis.
pub fn payload_preview(payload: &Value, max_chars: usize) -> String {
    let compact = payload.to_string();
    if compact.chars().count() <= max_chars {
        compact
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = compact.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_sync_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
