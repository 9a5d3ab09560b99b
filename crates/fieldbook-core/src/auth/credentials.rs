//! Credential persistence

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{AuthError, AuthResult, OAuthToken};

/// Where the token lives between process runs
pub trait CredentialStore: Clone + Send + Sync + 'static {
    fn load_token(&self) -> AuthResult<Option<OAuthToken>>;
    fn save_token(&self, token: &OAuthToken) -> AuthResult<()>;
    fn clear_token(&self) -> AuthResult<()>;
}

/// Process-local store, used in tests and as a no-persistence option
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    token: Arc<Mutex<Option<OAuthToken>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: OAuthToken) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token))),
        }
    }

    fn lock(&self) -> AuthResult<std::sync::MutexGuard<'_, Option<OAuthToken>>> {
        self.token
            .lock()
            .map_err(|_| AuthError::CredentialStore("credential lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load_token(&self) -> AuthResult<Option<OAuthToken>> {
        Ok(self.lock()?.clone())
    }

    fn save_token(&self, token: &OAuthToken) -> AuthResult<()> {
        *self.lock()? = Some(token.clone());
        Ok(())
    }

    fn clear_token(&self) -> AuthResult<()> {
        *self.lock()? = None;
        Ok(())
    }
}

/// JSON file on disk
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load_token(&self) -> AuthResult<Option<OAuthToken>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|error| {
            AuthError::CredentialStore(format!(
                "Failed to read {}: {error}",
                self.path.display()
            ))
        })?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save_token(&self, token: &OAuthToken) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                AuthError::CredentialStore(format!(
                    "Failed to create {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let serialized = serde_json::to_string(token)?;
        std::fs::write(&self.path, serialized).map_err(|error| {
            AuthError::CredentialStore(format!(
                "Failed to write {}: {error}",
                self.path.display()
            ))
        })
    }

    fn clear_token(&self) -> AuthResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(AuthError::CredentialStore(format!(
                "Failed to remove {}: {error}",
                self.path.display()
            ))),
        }
    }
}
