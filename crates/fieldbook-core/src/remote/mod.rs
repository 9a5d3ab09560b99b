//! Remote file stores the sync engine pushes to and pulls from.
//!
//! Paths are slash-separated and relative to the store's root folder, e.g.
//! `objects/obj-<id>.json`. Every call is independent: nothing here orders
//! or batches operations.

mod local_dir;
mod yandex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use local_dir::LocalDirStore;
pub use yandex::YandexDiskStore;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    File,
    Dir,
}

/// One listing result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    /// Path relative to the root folder
    pub path: String,
    pub kind: RemoteKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl RemoteEntry {
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == RemoteKind::File
    }
}

/// Authenticated file operations against a hierarchical remote store.
///
/// Fault taxonomy: `Error::NotFound` for absent paths, `Error::Auth` for
/// missing or rejected credentials, `Error::Transport` for everything the
/// network or service gets wrong.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// True iff a usable credential is held; may refresh it first.
    async fn is_authenticated(&self) -> bool;

    /// Create `path` (and its parents) if missing. Existing folders are success.
    async fn ensure_folder(&self, path: &str) -> Result<()>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Create or overwrite a file.
    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()>;

    /// Delete a file. A file that is already gone is success.
    async fn delete_file(&self, path: &str) -> Result<()>;

    /// Direct children of the folder at `path`.
    async fn list_files(&self, path: &str) -> Result<Vec<RemoteEntry>>;
}

/// Trim slashes and reject parent references; `""` is the root folder.
pub fn normalize_remote_path(path: &str) -> Result<String> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed
        .split('/')
        .any(|segment| segment == ".." || segment == "." || (segment.is_empty() && !trimmed.is_empty()))
    {
        return Err(Error::InvalidInput(format!(
            "Remote path is not a plain relative path: {path}"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_remote_path_trims_and_validates() {
        assert_eq!(normalize_remote_path("/objects/").unwrap(), "objects");
        assert_eq!(normalize_remote_path("").unwrap(), "");
        assert_eq!(
            normalize_remote_path("objects/obj-1.json").unwrap(),
            "objects/obj-1.json"
        );
        assert!(normalize_remote_path("objects/../secrets").is_err());
        assert!(normalize_remote_path("objects//obj-1.json").is_err());
    }
}
