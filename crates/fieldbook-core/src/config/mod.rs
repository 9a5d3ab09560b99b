//! Remote storage configuration.
//!
//! Values come from `FIELDBOOK_*` environment variables by default, but the
//! parser takes a lookup closure so tests never touch the process environment.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const CLIENT_ID_VAR: &str = "FIELDBOOK_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "FIELDBOOK_CLIENT_SECRET";
pub const REDIRECT_URI_VAR: &str = "FIELDBOOK_REDIRECT_URI";
pub const ROOT_FOLDER_VAR: &str = "FIELDBOOK_ROOT_FOLDER";
pub const API_BASE_URL_VAR: &str = "FIELDBOOK_API_BASE_URL";
pub const OAUTH_BASE_URL_VAR: &str = "FIELDBOOK_OAUTH_BASE_URL";

pub const DEFAULT_API_BASE_URL: &str = "https://cloud-api.yandex.net/v1/disk";
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://oauth.yandex.ru";

/// OAuth client registration plus where records live on the remote disk
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Folder under the disk root holding every collection
    pub root_folder: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_oauth_base_url() -> String {
    DEFAULT_OAUTH_BASE_URL.to_string()
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("root_folder", &self.root_folder)
            .field("api_base_url", &self.api_base_url)
            .field("oauth_base_url", &self.oauth_base_url)
            .finish()
    }
}

impl RemoteConfig {
    /// Build a config with the default provider endpoints.
    pub fn new(client_id: impl Into<String>, root_folder: impl AsRef<str>) -> Result<Self> {
        let client_id = normalize_text_option(Some(client_id.into()))
            .ok_or_else(|| Error::InvalidInput("OAuth client id must not be empty".to_string()))?;
        Ok(Self {
            client_id,
            client_secret: None,
            redirect_uri: None,
            root_folder: normalize_root_folder(root_folder.as_ref())?,
            api_base_url: default_api_base_url(),
            oauth_base_url: default_oauth_base_url(),
        })
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| std::env::var(key).ok())
    }
}

/// Parse configuration through `lookup`.
///
/// Returns `Ok(None)` when no variable is set at all (local-only mode).
pub fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<RemoteConfig>> {
    let read = |key: &str| normalize_text_option(lookup(key));

    let client_id = read(CLIENT_ID_VAR);
    let root_folder = read(ROOT_FOLDER_VAR);
    let client_secret = read(CLIENT_SECRET_VAR);
    let redirect_uri = read(REDIRECT_URI_VAR);
    let api_base_url = read(API_BASE_URL_VAR);
    let oauth_base_url = read(OAUTH_BASE_URL_VAR);

    let any_set = [
        &client_id,
        &root_folder,
        &client_secret,
        &redirect_uri,
        &api_base_url,
        &oauth_base_url,
    ]
    .iter()
    .any(|value| value.is_some());
    if !any_set {
        return Ok(None);
    }

    let (Some(client_id), Some(root_folder)) = (client_id.clone(), root_folder.clone()) else {
        let missing: Vec<&str> = [(CLIENT_ID_VAR, &client_id), (ROOT_FOLDER_VAR, &root_folder)]
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| key)
            .collect();
        return Err(Error::InvalidInput(format!(
            "Incomplete remote configuration; missing {}",
            missing.join(", ")
        )));
    };

    let mut config = RemoteConfig::new(client_id, root_folder)?;
    config.client_secret = client_secret;
    config.redirect_uri = redirect_uri;
    if let Some(url) = api_base_url {
        config.api_base_url = normalize_base_url(&url, API_BASE_URL_VAR)?;
    }
    if let Some(url) = oauth_base_url {
        config.oauth_base_url = normalize_base_url(&url, OAUTH_BASE_URL_VAR)?;
    }
    Ok(Some(config))
}

/// Trim surrounding slashes; reject empty folders and parent references.
pub fn normalize_root_folder(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "Remote root folder must not be empty".to_string(),
        ));
    }
    if trimmed.split('/').any(|segment| segment == ".." || segment.is_empty()) {
        return Err(Error::InvalidInput(format!(
            "Remote root folder is not a plain path: {raw}"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_base_url(raw: &str, field: &str) -> Result<String> {
    if is_http_url(raw) {
        Ok(raw.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(format!(
            "{field} must include http:// or https://"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key: &str| values.get(key).cloned()
    }

    #[test]
    fn no_variables_means_local_only() {
        assert!(parse_config(lookup_from(&[])).unwrap().is_none());
        assert!(parse_config(lookup_from(&[(CLIENT_ID_VAR, "  ")]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn full_configuration_parses_with_defaults() {
        let config = parse_config(lookup_from(&[
            (CLIENT_ID_VAR, "client"),
            (CLIENT_SECRET_VAR, "secret"),
            (ROOT_FOLDER_VAR, "/InspectionApp/"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.client_id, "client");
        assert_eq!(config.client_secret.as_deref(), Some("secret"));
        assert_eq!(config.root_folder, "InspectionApp");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.oauth_base_url, DEFAULT_OAUTH_BASE_URL);
    }

    #[test]
    fn partial_configuration_names_missing_variables() {
        let error = parse_config(lookup_from(&[(CLIENT_SECRET_VAR, "secret")])).unwrap_err();
        let message = error.to_string();
        assert!(message.contains(CLIENT_ID_VAR));
        assert!(message.contains(ROOT_FOLDER_VAR));
    }

    #[test]
    fn base_urls_must_be_http() {
        let error = parse_config(lookup_from(&[
            (CLIENT_ID_VAR, "client"),
            (ROOT_FOLDER_VAR, "app"),
            (API_BASE_URL_VAR, "cloud-api.example"),
        ]))
        .unwrap_err();
        assert!(error.to_string().contains(API_BASE_URL_VAR));
    }

    #[test]
    fn root_folder_rejects_parent_segments() {
        assert!(normalize_root_folder("app/../etc").is_err());
        assert!(normalize_root_folder("//").is_err());
        assert_eq!(normalize_root_folder("apps/fieldbook").unwrap(), "apps/fieldbook");
    }

    #[test]
    fn debug_redacts_client_secret() {
        let mut config = RemoteConfig::new("client", "app").unwrap();
        config.client_secret = Some("very-secret".to_string());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret"));
    }
}
