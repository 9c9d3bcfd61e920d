//! Persisted-state row types (spec.md §3/§6): `ValidationStatusRow` and
//! `ErrorRow`, one per known input entity per center, plus the snapshots
//! the pipeline reads them into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Center, FileType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Validated,
    Invalid,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Validated => "VALIDATED",
            ValidationStatus::Invalid => "INVALID",
        }
    }
}

/// One row per known input entity per center. Invariant: at most one row
/// per `id` (spec.md §3). Created on first sighting; updated whenever
/// `(md5, name, status)` changes; deleted only when reconciliation
/// explicitly removes it (e.g. a no-longer-duplicated filename).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationStatusRow {
    pub id: String,
    pub md5: String,
    pub status: ValidationStatus,
    pub name: String,
    pub center: Center,
    pub modified_on: DateTime<Utc>,
    pub file_type: FileType,
}

/// One row per `INVALID` input entity per center, carrying the assembled
/// error report string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRow {
    pub id: String,
    pub errors: String,
    pub name: String,
    pub file_type: FileType,
    pub center: Center,
}

/// The status/error tables' contents for one center, as fetched from the
/// Platform Gateway at the start of a run.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub rows: Vec<ValidationStatusRow>,
}

impl StatusSnapshot {
    pub fn find(&self, id: &str) -> Option<&ValidationStatusRow> {
        self.rows.iter().find(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorSnapshot {
    pub rows: Vec<ErrorRow>,
}

impl ErrorSnapshot {
    pub fn find(&self, id: &str) -> Option<&ErrorRow> {
        self.rows.iter().find(|r| r.id == id)
    }
}
