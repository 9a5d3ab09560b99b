//! A local directory standing in for the remote store (network mounts, tests)

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{normalize_remote_path, RemoteEntry, RemoteKind, RemoteStore};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local_path(&self, path: &str) -> Result<PathBuf> {
        let relative = normalize_remote_path(path)?;
        if relative.is_empty() {
            return Ok(self.root.clone());
        }
        Ok(self.root.join(relative))
    }
}

fn not_found_or(error: std::io::Error, path: &str) -> Error {
    if error.kind() == ErrorKind::NotFound {
        Error::NotFound(path.to_string())
    } else {
        Error::Io(error)
    }
}

#[async_trait]
impl RemoteStore for LocalDirStore {
    async fn is_authenticated(&self) -> bool {
        true
    }

    async fn ensure_folder(&self, path: &str) -> Result<()> {
        let local = self.local_path(path)?;
        tokio::fs::create_dir_all(local).await?;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let local = self.local_path(path)?;
        tokio::fs::read(local)
            .await
            .map_err(|error| not_found_or(error, path))
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        let local = self.local_path(path)?;
        let Some(file_name) = local.file_name().map(|name| name.to_string_lossy().to_string())
        else {
            return Err(Error::InvalidInput(format!(
                "Remote write needs a file path, got '{path}'"
            )));
        };
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Readers never observe a half-written file
        let staging = local.with_file_name(format!(".{file_name}.partial"));
        tokio::fs::write(&staging, contents).await?;
        tokio::fs::rename(&staging, &local).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let local = self.local_path(path)?;
        match tokio::fs::remove_file(local).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn list_files(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let relative = normalize_remote_path(path)?;
        let local = self.local_path(&relative)?;
        let mut dir = tokio::fs::read_dir(&local)
            .await
            .map_err(|error| not_found_or(error, path))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let metadata = entry.metadata().await?;
            let (kind, size) = if metadata.is_dir() {
                (RemoteKind::Dir, None)
            } else {
                (RemoteKind::File, Some(metadata.len()))
            };
            let entry_path = if relative.is_empty() {
                name.clone()
            } else {
                format!("{relative}/{name}")
            };
            entries.push(RemoteEntry {
                name,
                path: entry_path,
                kind,
                size,
            });
        }

        entries.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(entries)
    }
}
