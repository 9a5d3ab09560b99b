//! Mutation queue entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::models::Envelope;

/// Identifier of a queue entry (distinct from the record id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(String);

impl MutationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MutationId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Mutation id cannot be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

impl MutationAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for MutationAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!(
                "Unknown mutation action: {other}"
            ))),
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    Pending,
    Synced,
    Error,
}

impl MutationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl FromStr for MutationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!(
                "Unknown mutation status: {other}"
            ))),
        }
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending outbound change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEntry {
    pub id: MutationId,
    pub action: MutationAction,
    /// Remote path the entry targets, e.g. `objects/obj-<id>.json`
    pub path: String,
    /// Envelope to write; absent for deletes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Envelope>,
    pub status: MutationStatus,
    pub created_at: DateTime<Utc>,
    /// Last failure message, present only while `status` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MutationEntry {
    #[must_use]
    pub fn new(action: MutationAction, path: impl Into<String>, payload: Option<Envelope>) -> Self {
        Self {
            id: MutationId::new(),
            action,
            path: path.into(),
            payload,
            status: MutationStatus::Pending,
            created_at: Utc::now(),
            error: None,
        }
    }

    /// Apply a status transition, keeping `error` only alongside `MutationStatus::Error`.
    pub fn set_status(&mut self, status: MutationStatus, error: Option<String>) {
        self.status = status;
        self.error = match status {
            MutationStatus::Error => {
                Some(error.unwrap_or_else(|| "unknown error".to_string()))
            }
            MutationStatus::Pending | MutationStatus::Synced => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_pending_without_error() {
        let entry = MutationEntry::new(MutationAction::Delete, "objects/obj-1.json", None);
        assert_eq!(entry.status, MutationStatus::Pending);
        assert!(entry.error.is_none());
        assert!(entry.payload.is_none());
    }

    #[test]
    fn error_message_only_kept_for_error_status() {
        let mut entry = MutationEntry::new(MutationAction::Create, "objects/obj-1.json", None);
        entry.set_status(MutationStatus::Error, Some("HTTP 500".to_string()));
        assert_eq!(entry.error.as_deref(), Some("HTTP 500"));

        entry.set_status(MutationStatus::Synced, Some("ignored".to_string()));
        assert!(entry.error.is_none());

        entry.set_status(MutationStatus::Error, None);
        assert_eq!(entry.error.as_deref(), Some("unknown error"));
    }

    #[test]
    fn action_and_status_parse_their_display_form() {
        for action in [
            MutationAction::Create,
            MutationAction::Update,
            MutationAction::Delete,
        ] {
            assert_eq!(action.as_str().parse::<MutationAction>().unwrap(), action);
        }
        for status in [
            MutationStatus::Pending,
            MutationStatus::Synced,
            MutationStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<MutationStatus>().unwrap(), status);
        }
    }
}
