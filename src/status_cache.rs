//! Status Cache & Reuse (spec.md §4.4), grounded on
//! `original_source/input_to_database.py`'s `check_existing_file_status`.
//!
//! Implemented as a pure function with no I/O so it is unit-testable in
//! isolation, validators being pure functions over a `DataFrame` plus a
//! thin orchestration wrapper that logs.

use crate::entity::Entity;
use crate::error::{PipelineError, PipelineResult};
use crate::status::{ErrorSnapshot, StatusSnapshot, ValidationStatus};

/// The cached outcome for one entity, to reuse verbatim when revalidation
/// is unnecessary.
#[derive(Debug, Clone)]
pub struct CachedOutcome {
    pub status: ValidationStatus,
    pub errors: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CacheDecision {
    Revalidate,
    Reuse(CachedOutcome),
}

/// Decide whether a submission unit needs revalidation.
///
/// OR across entities, evaluated in order: revalidate iff any entity (1)
/// has no StatusRow, (2) has a StatusRow whose `md5`/`name` differs from
/// its current value, or (3) has an `INVALID` StatusRow with no
/// corresponding ErrorRow.
pub fn decide(
    status_snapshot: &StatusSnapshot,
    error_snapshot: &ErrorSnapshot,
    entities: &[Entity],
) -> PipelineResult<CacheDecision> {
    if entities.len() > 2 {
        return Err(PipelineError::InvariantViolation(
            "at most two entities per submission unit".to_string(),
        ));
    }

    for entity in entities {
        let Some(row) = status_snapshot.find(&entity.id) else {
            return Ok(CacheDecision::Revalidate);
        };
        if row.md5 != entity.md5 || row.name != entity.name {
            return Ok(CacheDecision::Revalidate);
        }
        if row.status == ValidationStatus::Invalid && error_snapshot.find(&entity.id).is_none() {
            return Ok(CacheDecision::Revalidate);
        }
    }

    // Cached outcome is whatever the (single, or first) entity's row says;
    // a two-entity submission unit shares one status/report between both
    // physical files, matching the patient+sample clinical pairing.
    let primary = entities.first().expect("submission unit has at least one entity");
    let row = status_snapshot
        .find(&primary.id)
        .expect("presence checked above");
    let errors = error_snapshot.find(&primary.id).map(|e| e.errors.clone());

    Ok(CacheDecision::Reuse(CachedOutcome {
        status: row.status,
        errors,
    }))
}
