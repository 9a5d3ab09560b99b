//! Yandex Disk REST adapter.
//!
//! Every resource lives under `disk:/<root>/<path>`. Reads and writes are
//! two-step: the API hands out a short-lived `href` which is then fetched
//! or uploaded to directly.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;

use super::{normalize_remote_path, RemoteEntry, RemoteKind, RemoteStore};
use crate::auth::{Authenticator, CredentialStore};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::util::compact_text;

const LIST_PAGE_SIZE: usize = 100;

pub struct YandexDiskStore<S: CredentialStore> {
    auth: Arc<Authenticator<S>>,
    api_base_url: String,
    root_folder: String,
    client: Client,
}

impl<S: CredentialStore> YandexDiskStore<S> {
    pub fn new(config: &RemoteConfig, auth: Arc<Authenticator<S>>) -> Result<Self> {
        Ok(Self {
            auth,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            root_folder: crate::config::normalize_root_folder(&config.root_folder)?,
            client: Client::builder().build()?,
        })
    }

    pub const fn authenticator(&self) -> &Arc<Authenticator<S>> {
        &self.auth
    }

    /// `disk:/<root>/<path>`, or `disk:/<root>` for the root itself
    fn disk_path(&self, path: &str) -> Result<String> {
        let relative = normalize_remote_path(path)?;
        Ok(disk_path(&self.root_folder, &relative))
    }

    async fn api_request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Response> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .request(method, format!("{}{endpoint}", self.api_base_url))
            .header("Authorization", format!("OAuth {token}"))
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;
        Ok(response)
    }

    /// Ask the API for a transfer link, then follow it.
    async fn transfer_link(&self, endpoint: &str, query: &[(&str, &str)], path: &str) -> Result<String> {
        let response = self.api_request(Method::GET, endpoint, query).await?;
        let link: Link = check_status(response, path).await?.json().await?;
        Ok(link.href)
    }
}

#[async_trait]
impl<S: CredentialStore> RemoteStore for YandexDiskStore<S> {
    async fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated().await
    }

    async fn ensure_folder(&self, path: &str) -> Result<()> {
        let relative = normalize_remote_path(path)?;
        let full = if relative.is_empty() {
            self.root_folder.clone()
        } else {
            format!("{}/{relative}", self.root_folder)
        };

        // Parents first; the API refuses to create a folder whose parent is missing
        let mut current = String::new();
        for segment in full.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);

            let target = format!("disk:/{current}");
            let response = self
                .api_request(Method::PUT, "/resources", &[("path", target.as_str())])
                .await?;
            if response.status() == StatusCode::CONFLICT {
                continue;
            }
            check_status(response, &current).await?;
        }
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.disk_path(path)?;
        let href = self
            .transfer_link("/resources/download", &[("path", target.as_str())], path)
            .await?;

        let response = self.client.get(href).send().await?;
        let bytes = check_status(response, path).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        let target = self.disk_path(path)?;
        let href = self
            .transfer_link(
                "/resources/upload",
                &[("path", target.as_str()), ("overwrite", "true")],
                path,
            )
            .await?;

        let response = self
            .client
            .put(href)
            .header("Content-Type", "application/json")
            .body(contents.to_vec())
            .send()
            .await?;
        check_status(response, path).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let target = self.disk_path(path)?;
        let response = self
            .api_request(Method::DELETE, "/resources", &[("path", target.as_str())])
            .await?;
        match check_status(response, path).await {
            Ok(_) => Ok(()),
            Err(Error::NotFound(_)) => {
                tracing::debug!("Remote file {} already gone", path);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn list_files(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let target = self.disk_path(path)?;
        let limit = LIST_PAGE_SIZE.to_string();
        let mut entries = Vec::new();
        let mut offset = 0_usize;

        loop {
            let offset_param = offset.to_string();
            let response = self
                .api_request(
                    Method::GET,
                    "/resources",
                    &[
                        ("path", target.as_str()),
                        ("limit", limit.as_str()),
                        ("offset", offset_param.as_str()),
                    ],
                )
                .await?;
            let resource: Resource = check_status(response, path).await?.json().await?;
            let Some(embedded) = resource.embedded else {
                break;
            };

            let page_len = embedded.items.len();
            entries.extend(
                embedded
                    .items
                    .into_iter()
                    .map(|item| item.into_entry(&self.root_folder)),
            );
            offset += page_len;

            let total = embedded.total.unwrap_or(offset);
            if page_len < LIST_PAGE_SIZE || offset >= total {
                break;
            }
        }

        Ok(entries)
    }
}

fn disk_path(root_folder: &str, relative: &str) -> String {
    if relative.is_empty() {
        format!("disk:/{root_folder}")
    } else {
        format!("disk:/{root_folder}/{relative}")
    }
}

/// Map a non-success response onto the fault taxonomy.
async fn check_status(response: Response, path: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body, path))
}

fn status_error(status: StatusCode, body: &str, path: &str) -> Error {
    let detail = parse_api_error(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Auth(format!("{path}: {detail}"))
        }
        StatusCode::NOT_FOUND => Error::NotFound(path.to_string()),
        _ => Error::Transport(format!("{path}: {detail}")),
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    description: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.description).or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "_embedded")]
    embedded: Option<ResourceList>,
}

#[derive(Debug, Deserialize)]
struct ResourceList {
    #[serde(default)]
    items: Vec<ResourceItem>,
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ResourceItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    size: Option<u64>,
}

impl ResourceItem {
    fn into_entry(self, root_folder: &str) -> RemoteEntry {
        let prefix = format!("disk:/{root_folder}/");
        let path = self
            .path
            .strip_prefix(&prefix)
            .map_or_else(|| self.path.clone(), str::to_string);
        RemoteEntry {
            name: self.name,
            path,
            kind: if self.kind == "dir" {
                RemoteKind::Dir
            } else {
                RemoteKind::File
            },
            size: self.size,
        }
    }
}
