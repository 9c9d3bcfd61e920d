//! `Dataset`, a thin wrapper around a polars `DataFrame` that carries the
//! source filename alongside it (needed by the duplicate-filename pass and
//! by error reporting), and the typed kwargs record formats are dispatched
//! with (spec.md §4.2, REDESIGN FLAGS: typed parameter records rather than
//! an ad-hoc dict).

use polars::prelude::DataFrame;
use std::collections::HashMap;

/// Row-oriented data loaded from one or more entities, generalizing the
/// teacher's `DataSource::load() -> PolarsResult<DataFrame>` into the
/// `read` step of the `FileFormat` contract.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub frame: DataFrame,
    /// Names of the source file(s) this dataset was read from, in entity
    /// order — carried through so validation errors can cite a filename.
    pub source_names: Vec<String>,
}

impl Dataset {
    pub fn new(frame: DataFrame, source_names: Vec<String>) -> Self {
        Dataset { frame, source_names }
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

/// A parameter value a `FileFormat::validate`/`process` call may receive.
/// Sufficient for the kwargs the original formats actually pass
/// (`newPath`, `databaseSynId`, `parentId`, `project_id`): a handful of
/// string-shaped identifiers, not an open-ended dict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KwargValue {
    Str(String),
    ProjectId(String),
    SynId(String),
}

impl KwargValue {
    pub fn as_str(&self) -> &str {
        match self {
            KwargValue::Str(s) => s,
            KwargValue::ProjectId(s) => s,
            KwargValue::SynId(s) => s,
        }
    }
}

pub type KwargMap = HashMap<&'static str, KwargValue>;

/// Check that every name in `required` is present in `kwargs`, returning
/// the first missing one as a `PipelineError::MissingParameter`.
pub fn require_kwargs(
    kwargs: &KwargMap,
    required: &'static [&'static str],
) -> crate::error::PipelineResult<()> {
    for name in required {
        if !kwargs.contains_key(name) {
            return Err(crate::error::PipelineError::MissingParameter(name));
        }
    }
    Ok(())
}
