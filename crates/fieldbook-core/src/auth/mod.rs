//! Credential lifecycle for the remote file store.
//!
//! The token is owned by an [`Authenticator`]; remote adapters only ask it
//! for a valid access token and never read token internals themselves.

mod authenticator;
mod credentials;
mod oauth;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use authenticator::{Authenticator, REFRESH_MARGIN_SECONDS};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use oauth::OAuthClient;

use crate::util::unix_timestamp_now;

/// Access credential plus expiry, optionally refreshable
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: i64,
}

impl OAuthToken {
    /// Build a token that expires `expires_in` seconds from now
    #[must_use]
    pub fn expiring_in(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: unix_timestamp_now().saturating_add(expires_in),
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now()
    }

    /// Whether the token expires within `margin` seconds
    #[must_use]
    pub fn expires_within(&self, margin: i64) -> bool {
        self.expires_at <= unix_timestamp_now().saturating_add(margin)
    }

    #[must_use]
    pub const fn is_refreshable(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OAuthToken")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Remote storage is not configured.")]
    NotConfigured,
    #[error("Not signed in to remote storage.")]
    NotAuthenticated,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("OAuth API error: {0}")]
    Api(String),
    #[error("Credential storage error: {0}")]
    CredentialStore(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<AuthError> for crate::Error {
    fn from(error: AuthError) -> Self {
        Self::Auth(error.to_string())
    }
}
