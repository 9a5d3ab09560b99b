//! Record collections and their remote file layout

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::models::RecordId;

/// Named partition of the local store, mirrored by one remote folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Objects,
    Equipment,
    Inspections,
    Violations,
}

impl Collection {
    pub const ALL: [Self; 4] = [
        Self::Objects,
        Self::Equipment,
        Self::Inspections,
        Self::Violations,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Objects => "objects",
            Self::Equipment => "equipment",
            Self::Inspections => "inspections",
            Self::Violations => "violations",
        }
    }

    /// Remote folder holding this collection's files
    #[must_use]
    pub const fn folder(self) -> &'static str {
        self.as_str()
    }

    /// File name prefix in front of the record id
    #[must_use]
    pub const fn file_prefix(self) -> &'static str {
        match self {
            Self::Objects => "obj-",
            Self::Equipment => "eq-",
            Self::Inspections => "insp-",
            Self::Violations => "viol-",
        }
    }

    /// Remote path for a record: `<folder>/<prefix><id>.json`
    #[must_use]
    pub fn record_path(self, id: &RecordId) -> String {
        format!("{}/{}{}.json", self.folder(), self.file_prefix(), id)
    }

    /// Derive the record id from a remote file name, e.g. `obj-r2.json` -> `r2`.
    ///
    /// Returns `None` for names that do not follow this collection's layout.
    #[must_use]
    pub fn record_id_from_file_name(self, file_name: &str) -> Option<RecordId> {
        let stem = file_name.strip_suffix(".json")?;
        let id = stem.strip_prefix(self.file_prefix())?;
        id.parse().ok()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|collection| collection.as_str() == normalized)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Unknown collection '{s}' (expected one of: objects, equipment, inspections, violations)"
                ))
            })
    }
}
