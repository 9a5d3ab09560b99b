//! Record envelope model

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque identifier of a record, stable for the record's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new random record ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Record id cannot be empty".to_string()));
        }
        if trimmed.contains('/') {
            return Err(Error::InvalidInput(format!(
                "Record id must not contain '/': {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Versioned wrapper around one domain record, the unit of replication.
///
/// The sync engine only inspects `id` and `version`; `payload` is opaque
/// to it and serialized under the `data` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T = serde_json::Value> {
    pub id: RecordId,
    /// Starts at 1, incremented once per local mutation
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "data", alias = "payload")]
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Wrap a fresh payload at version 1
    #[must_use]
    pub fn new(payload: T) -> Self {
        Self::with_id(RecordId::new(), payload)
    }

    #[must_use]
    pub fn with_id(id: RecordId, payload: T) -> Self {
        let now = Utc::now();
        Self {
            id,
            version: 1,
            created_at: now,
            updated_at: now,
            payload,
        }
    }

    /// Replace the payload as one local mutation: bumps `version` and `updated_at`.
    pub fn apply_update(&mut self, payload: T) {
        self.payload = payload;
        self.version = self.version.saturating_add(1);
        self.updated_at = Utc::now().max(self.created_at);
    }

    /// Whether `other` should replace `self` under last-writer-by-version-wins.
    #[must_use]
    pub const fn is_superseded_by<U>(&self, other: &Envelope<U>) -> bool {
        other.version > self.version
    }
}

impl<T: Serialize> Envelope<T> {
    /// Erase the payload type into JSON for storage.
    pub fn to_value(&self) -> Result<Envelope> {
        Ok(Envelope {
            id: self.id.clone(),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            payload: serde_json::to_value(&self.payload)?,
        })
    }
}

impl Envelope {
    /// Recover a typed payload from a stored JSON envelope.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Envelope<T>> {
        Ok(Envelope {
            id: self.id,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            payload: serde_json::from_value(self.payload)?,
        })
    }

    /// Parse an envelope from remote file bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let envelope: Self = serde_json::from_slice(bytes)?;
        if envelope.version == 0 {
            return Err(Error::InvalidInput(format!(
                "Envelope {} has version 0",
                envelope.id
            )));
        }
        Ok(envelope)
    }

    /// Serialize for the remote store (pretty JSON, like the files humans browse).
    pub fn to_vec_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
