//! Pass status and result types

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// A pass has started
    Syncing,
    /// The pass finished without any per-item error
    Success,
    /// The pass finished, but at least one item failed
    Error,
    /// No usable credential; nothing was contacted
    LocalOnly,
    /// Another pass was already running; this request did nothing
    AlreadySyncing,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syncing => "syncing",
            Self::Success => "success",
            Self::Error => "error",
            Self::LocalOnly => "local_only",
            Self::AlreadySyncing => "already_syncing",
        }
    }

    /// Whether this status ends a pass (or a request for one)
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Syncing)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed item, with enough context to retry or diagnose it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncIssue {
    /// Remote path involved, absent for pass-level failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
}

impl SyncIssue {
    pub fn at(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self {
            path: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{path}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub status: SyncStatus,
    pub uploaded: u64,
    pub downloaded: u64,
    pub errors: Vec<SyncIssue>,
}

impl SyncResult {
    #[must_use]
    pub const fn new(status: SyncStatus) -> Self {
        Self {
            status,
            uploaded: 0,
            downloaded: 0,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub const fn files_synced(&self) -> u64 {
        self.uploaded.saturating_add(self.downloaded)
    }

    pub(crate) fn record(&mut self, issue: SyncIssue) {
        tracing::warn!("Sync issue: {}", issue);
        self.errors.push(issue);
    }

    /// Settle the terminal status from the collected errors
    pub(crate) fn finish(&mut self) {
        self.status = if self.errors.is_empty() {
            SyncStatus::Success
        } else {
            SyncStatus::Error
        };
    }
}
