//! CLI command implementations (spec.md §6). Each submodule corresponds
//! to one subcommand in [`crate::cli::Commands`] and wires the lower-level
//! modules (`registry`, `gateway`, `pipeline`) into a runnable operation.
//!
//! No production `Gateway` ships with this crate (spec.md §1's "out of
//! scope" list covers the concrete wire calls); every command below runs
//! against [`crate::gateway::InMemoryGateway`], the same backend the unit
//! tests use, mirroring how the CLI degrades to a local filesystem-backed
//! connector when no remote profile is configured.

pub mod bootstrap_infra;
pub mod get_file_errors;
pub mod process;
pub mod replace_db;
pub mod validate_single_file;

use std::sync::Arc;

use crate::error::PipelineResult;
use crate::formats::{ClinicalFormat, PatientFormat};
use crate::registry::{FormatRegistry, RegistryBuilder};
use crate::validation_helper::DefaultValidationHelper;

/// The format registry every command shares: the two bundled formats plus
/// the default validation helper, optionally extended by
/// `--format-registry-packages` (accepted for interface parity with
/// spec.md §6 but, absent a plugin-loading mechanism, only logged).
pub fn build_registry(extension_packages: &[String]) -> PipelineResult<FormatRegistry> {
    for package in extension_packages {
        tracing::warn!(package = %package, "format registry package requested but no plugin loader is wired in");
    }
    RegistryBuilder::new()
        .register("center_ingest_builtin", vec![Arc::new(PatientFormat), Arc::new(ClinicalFormat)])
        .with_validation_helper(Arc::new(DefaultValidationHelper))
        .build()
}

pub const STATUS_TABLE: &str = "validationStatus";
pub const ERROR_TABLE: &str = "errorTracker";
pub const CENTER_MAPPING_TABLE: &str = "centerMapping";
pub const DB_MAPPING_TABLE: &str = "dbMapping";

/// The status and error tables are shared across every center; each worker
/// filters its own snapshot down to `center = ?` after querying
/// (`TableSnapshot::filter_text_eq`) rather than the tables themselves
/// being split per center.
pub fn status_table_handle() -> crate::gateway::TableHandle {
    crate::gateway::TableHandle::from(STATUS_TABLE)
}

pub fn error_table_handle() -> crate::gateway::TableHandle {
    crate::gateway::TableHandle::from(ERROR_TABLE)
}
