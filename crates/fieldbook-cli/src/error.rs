use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fieldbook_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No record payload provided")]
    EmptyPayload,
    #[error("Record payload must be valid JSON: {0}")]
    InvalidPayload(String),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Remote store is not configured. Run `fieldbook config init`, or set FIELDBOOK_CLIENT_ID and FIELDBOOK_ROOT_FOLDER."
    )]
    RemoteNotConfigured,
    #[error("Sync finished with {0} error(s)")]
    SyncFailed(usize),
}

impl From<fieldbook_core::auth::AuthError> for CliError {
    fn from(error: fieldbook_core::auth::AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}
