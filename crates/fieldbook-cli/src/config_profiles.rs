//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fieldbook_core::RemoteConfig;
use serde::{Deserialize, Serialize};

pub use fieldbook_core::util::normalize_text_option;

const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const PROFILE_ENV_VAR: &str = "FIELDBOOK_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteKind {
    #[default]
    Yandex,
    LocalDir,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub remote: Option<RemoteKind>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub root_folder: Option<String>,
    #[serde(default)]
    pub local_dir: Option<PathBuf>,
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
    #[serde(default)]
    pub check_remote_version: Option<bool>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fieldbook").join(CONFIG_FILE_NAME))
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(str::to_string))
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        let path = default_config_path()
            .ok_or_else(|| "Failed to resolve CLI config directory".to_string())?;
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()
            .ok_or_else(|| "Failed to resolve CLI config directory".to_string())?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit flag, then `FIELDBOOK_PROFILE`, then the active profile, then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_name_with(explicit, std::env::var(PROFILE_ENV_VAR).ok().as_deref())
    }

    fn resolve_profile_name_with(&self, explicit: Option<&str>, from_env: Option<&str>) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(from_env))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn remote_kind(&self) -> RemoteKind {
        self.remote.unwrap_or_default()
    }

    pub fn checks_remote_version(&self) -> bool {
        self.check_remote_version.unwrap_or(false)
    }

    /// Fields still needed before this profile can reach its remote store
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self.remote_kind() {
            RemoteKind::Yandex => {
                if self.client_id.is_none() {
                    missing.push("client_id");
                }
                if self.root_folder.is_none() {
                    missing.push("root_folder");
                }
            }
            RemoteKind::LocalDir => {
                if self.local_dir.is_none() {
                    missing.push("local_dir");
                }
            }
        }
        missing
    }

    /// Provider configuration for a `yandex` profile, `None` when incomplete.
    pub fn remote_config(&self) -> fieldbook_core::Result<Option<RemoteConfig>> {
        let (Some(client_id), Some(root_folder)) = (&self.client_id, &self.root_folder) else {
            return Ok(None);
        };
        let mut config = RemoteConfig::new(client_id.clone(), root_folder)?;
        config.client_secret.clone_from(&self.client_secret);
        config.redirect_uri.clone_from(&self.redirect_uri);
        Ok(Some(config))
    }

    fn normalize(&mut self) {
        self.client_id = normalize_text_option(self.client_id.take());
        self.client_secret = normalize_text_option(self.client_secret.take());
        self.redirect_uri = normalize_text_option(self.redirect_uri.take());
        self.root_folder = normalize_text_option(self.root_folder.take());
        self.local_dir = self
            .local_dir
            .take()
            .filter(|path| !path.as_os_str().is_empty());
        self.sync_interval_secs = self.sync_interval_secs.filter(|secs| *secs > 0);
    }
}
