// src/error.rs
use polars::prelude::PolarsError;
use thiserror::Error;

/// Main error type for the ingestion pipeline.
///
/// `ValidationFailed`/`ReadFailure` are expected per-file outcomes that get
/// folded into a submission's report string rather than propagated; the
/// rest are programmer or platform errors that abort the current center.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataframe operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("could not read file(s) {path}: {source}")]
    ReadFailure { path: String, source: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("schema mismatch: existing columns {existing:?} != desired columns {desired:?}")]
    SchemaMismatch {
        existing: Vec<String>,
        desired: Vec<String>,
    },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("platform call failed, retryable: {0}")]
    PlatformTransient(String),

    #[error("platform call failed, non-retryable: {0}")]
    PlatformFatal(String),

    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("internal error: {0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("{0}")]
    Other(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<Box<dyn std::error::Error>> for PipelineError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        PipelineError::Other(err.to_string())
    }
}

impl PipelineError {
    /// True for the taxonomy entries that represent an expected, per-file
    /// outcome rather than a fatal pipeline condition.
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            PipelineError::ValidationFailed(_) | PipelineError::ReadFailure { .. }
        )
    }
}
