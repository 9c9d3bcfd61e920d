//! The `FileFormat` contract (spec.md §4.2): one implementation per
//! registered file type, dispatched to by the Format Registry and
//! Validation Helper.

use crate::dataset::{Dataset, KwargMap};
use crate::entity::{Entity, FileType};
use crate::error::PipelineResult;

/// Ordered primary-key column names, used both to build a row's
/// `UNIQUE_KEY` during reconciliation (spec.md §4.5) and to publish the
/// `primaryKey` annotation the original format classes set on their
/// destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey(pub Vec<String>);

impl PrimaryKey {
    pub fn columns(&self) -> &[String] {
        &self.0
    }
}

/// One registered file format: how to recognize it, read it, validate it,
/// and (if valid) transform it into the shape its destination table
/// expects.
pub trait FileFormat: Send + Sync {
    fn file_type(&self) -> FileType;

    /// Does this set of filenames belong to this format? Iterated in
    /// registration order by the registry; first match wins (spec.md
    /// §4.1/§4.3).
    fn filetype_matches(&self, filenames: &[String]) -> bool;

    /// Kwargs `validate` requires, checked once at dispatch time rather
    /// than inside every format (spec.md §4.2 edge case).
    fn required_validate_kwargs(&self) -> &'static [&'static str] {
        &[]
    }

    /// Kwargs `process` requires.
    fn required_process_kwargs(&self) -> &'static [&'static str] {
        &[]
    }

    /// Load the entities' contents into a row-oriented `Dataset`. A format
    /// that spans two physical files (e.g. patient + sample clinical)
    /// accepts a list of entities; single-file formats accept exactly one.
    fn read(&self, entities: &[Entity]) -> PipelineResult<Dataset>;

    /// Validate a loaded dataset, returning `(errors, warnings)` report
    /// strings (empty string means none).
    fn validate(&self, dataset: &Dataset, kwargs: &KwargMap) -> PipelineResult<(String, String)>;

    /// Transform a validated dataset into the shape its destination table
    /// expects.
    fn process(&self, dataset: Dataset, kwargs: &KwargMap) -> PipelineResult<Dataset>;

    /// The destination table's primary key columns.
    fn primary_key(&self) -> PrimaryKey;
}
