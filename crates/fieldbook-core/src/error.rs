//! Error types for fieldbook-core

use thiserror::Error;

/// Result type alias using fieldbook-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fieldbook-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Credential missing, expired, or rejected by the remote store
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Record, queue entry, or remote file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or remote-service failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local storage medium failure (quota, corruption, unavailability)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote copy is newer than the change being pushed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether a later attempt of the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Storage(_) | Self::Sqlite(_) | Self::Io(_)
        )
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_storage_faults_are_retryable() {
        assert!(Error::Transport("timeout".to_string()).is_retryable());
        assert!(Error::Storage("quota exceeded".to_string()).is_retryable());
        assert!(!Error::Auth("expired".to_string()).is_retryable());
        assert!(!Error::NotFound("objects/obj-1.json".to_string()).is_retryable());
        assert!(!Error::Conflict("remote version 5 > local 3".to_string()).is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let error = Error::NotFound("objects/obj-1.json".to_string());
        assert_eq!(error.to_string(), "Not found: objects/obj-1.json");
    }
}
