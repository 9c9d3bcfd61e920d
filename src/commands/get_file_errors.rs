//! `get-file-errors` (spec.md §6): print the concatenated error texts
//! recorded for one center. Grounded on
//! `original_source/input_to_database.py`'s error-tracker lookup helper.
//!
//! The error table is shared across centers, so the queried snapshot is
//! filtered down to `center = ?` before the report is built.

use crate::commands::error_table_handle;
use crate::error::{PipelineError, PipelineResult};
use crate::gateway::Gateway;

pub async fn run(gateway: &dyn Gateway, center: &str) -> PipelineResult<String> {
    let snapshot = gateway.query_table(&error_table_handle()).await?.filter_text_eq("center", center)?;

    if snapshot.frame.height() == 0 {
        return Ok(String::new());
    }
    let errors = snapshot.frame.column("errors").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;
    let names = snapshot.frame.column("name").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;

    let mut report = String::new();
    for i in 0..snapshot.frame.height() {
        report.push_str(&format!("{}: {}\n", names.get(i).unwrap_or_default(), errors.get(i).unwrap_or_default()));
    }
    Ok(report)
}
