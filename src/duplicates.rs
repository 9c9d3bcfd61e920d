//! Duplicate-filename detection (spec.md §4.6), grounded on
//! `get_duplicated_files` / `append_duplication_errors` /
//! `_update_tables_content`.
//!
//! Runs after per-file validation and before the reconciliation engine is
//! called on the status and error tables.

use std::collections::HashMap;

use crate::status::{ErrorRow, ValidationStatus, ValidationStatusRow};

const DUPLICATE_FILENAME_MESSAGE: &str = "Duplicated filename! Files should be uploaded as new \
    versions and the entire dataset should be uploaded.";

/// Flip every row sharing a `name` with another row to `INVALID` with the
/// canonical duplicate-filename message, and drop previously-recorded
/// duplicate errors whose files are no longer duplicated (mirrors the
/// original pipeline's `remove_ids`: dropping the error row lets the next
/// reconciliation pass delete it naturally, freeing the status row to
/// reflect the format's own validation outcome again).
pub fn apply_duplicate_pass(
    status_rows: &mut [ValidationStatusRow],
    error_rows: &mut Vec<ErrorRow>,
) {
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, row) in status_rows.iter().enumerate() {
        by_name.entry(row.name.as_str()).or_default().push(idx);
    }
    let duplicate_ids: std::collections::HashSet<String> = by_name
        .values()
        .filter(|ids| ids.len() > 1)
        .flat_map(|ids| ids.iter().map(|&i| status_rows[i].id.clone()))
        .collect();

    for row in status_rows.iter_mut() {
        if duplicate_ids.contains(&row.id) {
            row.status = ValidationStatus::Invalid;
            upsert_error(error_rows, row, DUPLICATE_FILENAME_MESSAGE);
        }
    }

    error_rows.retain(|e| {
        e.errors != DUPLICATE_FILENAME_MESSAGE || duplicate_ids.contains(&e.id)
    });
}

fn upsert_error(error_rows: &mut Vec<ErrorRow>, status_row: &ValidationStatusRow, message: &str) {
    if let Some(existing) = error_rows.iter_mut().find(|e| e.id == status_row.id) {
        existing.errors = message.to_string();
        return;
    }
    error_rows.push(ErrorRow {
        id: status_row.id.clone(),
        errors: message.to_string(),
        name: status_row.name.clone(),
        file_type: status_row.file_type.clone(),
        center: status_row.center.clone(),
    });
}
