//! Core domain primitives: the platform object model and the typed
//! `FileType`/`Center` row-filter keys (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A strongly-typed file-format discriminator, e.g. `"patient"`,
/// `"clinical"`. Generalizes a bare `String` contract-name convention —
/// this crate's reconciliation semantics depend on never confusing a
/// `FileType` with a `Center`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileType(pub String);

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FileType {
    fn from(s: &str) -> Self {
        FileType(s.to_string())
    }
}

/// A submitting center's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Center(pub String);

impl std::fmt::Display for Center {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Center {
    fn from(s: &str) -> Self {
        Center(s.to_string())
    }
}

/// A platform object identified by an opaque id.
///
/// Invariant: `(id, md5, name)` uniquely determines the object contents
/// relevant to validation caching (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub md5: String,
    pub size: u64,
    pub created_by: String,
    pub modified_by: String,
    pub modified_on: DateTime<Utc>,
    /// Populated once the Platform Gateway has downloaded the object.
    pub path: Option<PathBuf>,
    /// Free-form metadata; may carry a `filetype` hint that overrides
    /// automatic format detection (spec.md §4.3).
    #[serde(default)]
    pub annotations: HashMap<String, serde_json::Value>,
}

impl Entity {
    /// The explicit filetype override, if the submitter annotated one.
    pub fn filetype_override(&self) -> Option<FileType> {
        self.annotations
            .get("filetype")
            .and_then(|v| v.as_str())
            .map(FileType::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filetype_override_reads_annotation() {
        let mut entity = Entity {
            id: "syn1".into(),
            name: "patient.csv".into(),
            md5: "abc".into(),
            size: 10,
            created_by: "alice".into(),
            modified_by: "alice".into(),
            modified_on: Utc::now(),
            path: None,
            annotations: HashMap::new(),
        };
        assert!(entity.filetype_override().is_none());

        entity
            .annotations
            .insert("filetype".into(), serde_json::json!("patient"));
        assert_eq!(entity.filetype_override(), Some(FileType::from("patient")));
    }
}
