//! Per-Center Pipeline (spec.md §4.7), grounded on
//! `original_source/input_to_database.py`'s `center_input_to_database` /
//! `validation` / `processfiles`: enumerate a center's inputs, decide and
//! run validation per submission unit, reconcile the status and error
//! tables, notify submitters, then (unless `only_validate`) process and
//! reconcile each valid file into its format's destination table.
//!
//! Table write-back order mirrors the original's
//! `update_status_and_error_tables`: the error table is reconciled before
//! the status table, then format-table reconciliation only begins once
//! both have landed (spec.md §5's ordering guarantee).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use polars::prelude::{DataFrame, Series};

use crate::config::{GatewayPolicy, RunContext};
use crate::dataset::KwargMap;
use crate::duplicates::apply_duplicate_pass;
use crate::entity::{Center, Entity};
use crate::error::{PipelineError, PipelineResult};
use crate::gateway::{Gateway, TableHandle};
use crate::logging::center::CenterLog;
use crate::logging::schema::{AuditLogEntry, Target};
use crate::notify::{consolidate, Notifier, ReportItem};
use crate::reconcile::reconcile;
use crate::registry::FormatRegistry;
use crate::status::{ErrorRow, StatusSnapshot, ValidationStatus, ValidationStatusRow};
use crate::status_cache::{decide, CacheDecision};

/// Cooperative cancellation signal, checked between submission units and
/// before each Gateway call (spec.md §5). A plain `Arc<AtomicBool>` rather
/// than pulling in `tokio_util::sync::CancellationToken`, since nothing
/// else in this crate needs that dependency (see DESIGN.md).
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one center's pipeline run, returned to the CLI for exit-code
/// and summary purposes.
#[derive(Debug)]
pub struct CenterOutcome {
    pub center: Center,
    pub validated: usize,
    pub invalid: usize,
    pub fatal: Option<String>,
}

/// A unit of work for validation: 1 or 2 entities that together constitute
/// a single logical file (spec.md glossary: "Submission Unit").
fn group_into_submission_units(entities: Vec<Entity>) -> Vec<Vec<Entity>> {
    // Two-file formats (patient+sample clinical) pair files whose names
    // share a prefix up to the "_patient"/"_sample" marker; anything else
    // is its own single-entity unit. This mirrors the registry's own
    // `filetype_matches` grouping rather than re-deriving pairing rules
    // here: group eagerly by a naive name-prefix heuristic, and let
    // `determine_filetype` reject bad pairings during validation.
    let mut used = vec![false; entities.len()];
    let mut units = Vec::new();

    for i in 0..entities.len() {
        if used[i] {
            continue;
        }
        let name_i = entities[i].name.to_lowercase();
        if name_i.contains("patient") {
            if let Some(j) = (0..entities.len()).find(|&j| {
                !used[j] && j != i && entities[j].name.to_lowercase().contains("sample")
            }) {
                used[i] = true;
                used[j] = true;
                units.push(vec![entities[i].clone(), entities[j].clone()]);
                continue;
            }
        }
        used[i] = true;
        units.push(vec![entities[i].clone()]);
    }

    units
}

/// Retry a fallible Gateway call with the configured timeout/backoff
/// policy (spec.md §5). Only `PlatformTransient` failures are retried;
/// anything else (including a timeout, folded into `PlatformTransient`)
/// propagates after the attempt budget is exhausted.
async fn with_retry<T, F, Fut>(policy: &GatewayPolicy, mut call: F) -> PipelineResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = PipelineResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = tokio::time::timeout(policy.timeout, call()).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(PipelineError::PlatformTransient("gateway call timed out".to_string())),
        };
        match result {
            Ok(value) => return Ok(value),
            Err(PipelineError::PlatformTransient(msg)) if attempt < policy.max_attempts => {
                tracing::warn!(attempt, %msg, "retrying transient gateway failure");
                tokio::time::sleep(policy.backoff_base).await;
            }
            Err(other) => return Err(other),
        }
    }
}

/// Run the pipeline for a single center (spec.md §4.7 steps 1-8).
#[allow(clippy::too_many_arguments)]
pub async fn run_center(
    ctx: &RunContext,
    gateway: &dyn Gateway,
    notifier: &dyn Notifier,
    registry: &FormatRegistry,
    center: Center,
    status_table: &TableHandle,
    error_table: &TableHandle,
    only_validate: bool,
    delete_old: bool,
    cancellation: &CancellationToken,
) -> CenterOutcome {
    match run_center_inner(
        ctx,
        gateway,
        notifier,
        registry,
        &center,
        status_table,
        error_table,
        only_validate,
        delete_old,
        cancellation,
    )
    .await
    {
        Ok((validated, invalid)) => CenterOutcome {
            center,
            validated,
            invalid,
            fatal: None,
        },
        Err(err) => {
            tracing::error!(center = %center, error = %err, "center pipeline aborted");
            CenterOutcome {
                center,
                validated: 0,
                invalid: 0,
                fatal: Some(err.to_string()),
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_center_inner(
    ctx: &RunContext,
    gateway: &dyn Gateway,
    notifier: &dyn Notifier,
    registry: &FormatRegistry,
    center: &Center,
    status_table: &TableHandle,
    error_table: &TableHandle,
    only_validate: bool,
    delete_old: bool,
    cancellation: &CancellationToken,
) -> PipelineResult<(usize, usize)> {
    let center_log = CenterLog::open(&ctx.log_dir, &center.0, "run")
        .map_err(PipelineError::Io)?;
    let executor = crate::logging::current_executor();

    // Step 1: ensure this center's scratch directory exists, wiping it
    // first when `delete_old` is set.
    let center_scratch_dir = ctx.scratch_dir.join(&center.0);
    if delete_old && center_scratch_dir.exists() {
        std::fs::remove_dir_all(&center_scratch_dir).map_err(PipelineError::Io)?;
    }
    std::fs::create_dir_all(&center_scratch_dir).map_err(PipelineError::Io)?;

    // Step 2: enumerate the center's input container.
    let ids = with_retry(&ctx.gateway_policy, || gateway.list_container(center)).await?;
    let mut entities = Vec::with_capacity(ids.len());
    for id in &ids {
        if cancellation.is_cancelled() {
            return upload_and_return(gateway, center, center_log, (0, 0)).await;
        }
        let entity = with_retry(&ctx.gateway_policy, || gateway.fetch_entity(id, true)).await?;
        entities.push(entity);
    }

    // Step 3: query the shared status/error tables, filtered down to this
    // center's rows so concurrent workers never see or touch each other's
    // state.
    let status_snapshot_all = with_retry(&ctx.gateway_policy, || gateway.query_table(status_table)).await?;
    let error_snapshot_all = with_retry(&ctx.gateway_policy, || gateway.query_table(error_table)).await?;
    let status_snapshot_raw = status_snapshot_all.filter_text_eq("center", &center.0)?;
    let error_snapshot_raw = error_snapshot_all.filter_text_eq("center", &center.0)?;
    let status_snapshot = status_rows_from_snapshot(&status_snapshot_raw.frame, center)?;
    let error_snapshot = error_rows_from_snapshot(&error_snapshot_raw.frame, center)?;

    // Step 4: per submission unit, decide + validate.
    let mut new_status_rows: Vec<ValidationStatusRow> = Vec::new();
    let mut new_error_rows: Vec<ErrorRow> = Vec::new();
    let mut validated_entities: HashMap<String, Vec<Entity>> = HashMap::new();
    // Every entity seen this run, keyed by id, so notifications can be
    // assembled once after the duplicate-filename pass (step 5) has had
    // its say on which rows end up `INVALID` — a row a duplicate pass
    // flips still needs its owner notified, even though it passed its own
    // format's validator cleanly.
    let mut entity_by_id: HashMap<String, Entity> = HashMap::new();

    for unit in group_into_submission_units(entities) {
        if cancellation.is_cancelled() {
            break;
        }

        let decision = decide(&status_snapshot, &error_snapshot, &unit)?;
        let file_type = registry
            .validation_helper()
            .determine_filetype(registry, &unit)
            .or_else(|| status_snapshot.find(&unit[0].id).map(|r| r.file_type.clone()));

        let (status, report) = match decision {
            CacheDecision::Reuse(outcome) => (
                outcome.status,
                outcome.errors.unwrap_or_default(),
            ),
            CacheDecision::Revalidate => {
                let (valid, report) = registry.validation_helper().validate_single(
                    registry,
                    &unit,
                    &KwargMap::new(),
                )?;
                (
                    if valid { ValidationStatus::Validated } else { ValidationStatus::Invalid },
                    report,
                )
            }
        };

        for entity in &unit {
            new_status_rows.push(ValidationStatusRow {
                id: entity.id.clone(),
                md5: entity.md5.clone(),
                status,
                name: entity.name.clone(),
                center: center.clone(),
                modified_on: entity.modified_on,
                file_type: file_type.clone().unwrap_or_else(|| crate::entity::FileType::from("unknown")),
            });
            if status == ValidationStatus::Invalid {
                new_error_rows.push(ErrorRow {
                    id: entity.id.clone(),
                    errors: report.clone(),
                    name: entity.name.clone(),
                    file_type: file_type.clone().unwrap_or_else(|| crate::entity::FileType::from("unknown")),
                    center: center.clone(),
                });
            }
            entity_by_id.insert(entity.id.clone(), entity.clone());
        }

        if status == ValidationStatus::Validated {
            if let Some(ft) = &file_type {
                validated_entities.entry(ft.0.clone()).or_default().extend(unit);
            }
        }

        center_log.record(
            &AuditLogEntry::new("submission_validated", executor.clone())
                .with_center(center.0.clone())
                .with_target(Target {
                    id: new_status_rows.last().map(|r| r.id.clone()).unwrap_or_default(),
                    name: new_status_rows.last().map(|r| r.name.clone()).unwrap_or_default(),
                    status: Some(status.as_str().to_string()),
                }),
        );
    }

    // Step 5: duplicate-filename pass, then reconcile status + error tables.
    apply_duplicate_pass(&mut new_status_rows, &mut new_error_rows);

    // Notifications are built from the final error rows, i.e. after the
    // duplicate pass, so a file the duplicate pass itself invalidated
    // still reaches its owner (spec.md §8's literal duplicate-names
    // scenario: "notifier sends one email per distinct owner").
    let report_items: Vec<ReportItem> = new_error_rows
        .iter()
        .filter_map(|row| entity_by_id.get(&row.id).map(|entity| ReportItem::for_entity(entity, row.errors.clone())))
        .collect();
    let notifications = consolidate(center, &report_items);

    let error_desired = error_rows_to_frame(&new_error_rows)?;
    let error_delta = reconcile(
        &error_snapshot_raw,
        &error_desired,
        &crate::format::PrimaryKey(vec!["id".to_string()]),
        true,
    )?;
    with_retry(&ctx.gateway_policy, || gateway.apply_delta(error_table, error_delta.clone())).await?;

    let status_desired = status_rows_to_frame(&new_status_rows)?;
    let status_delta = reconcile(
        &status_snapshot_raw,
        &status_desired,
        &crate::format::PrimaryKey(vec!["id".to_string()]),
        true,
    )?;
    with_retry(&ctx.gateway_policy, || gateway.apply_delta(status_table, status_delta.clone())).await?;

    // Step 6: consolidate + dispatch notifications.
    for notification in &notifications {
        notifier.deliver(notification).await?;
    }

    // Step 7: process + reconcile valid files into their format tables.
    if !only_validate {
        for (file_type_tag, entities) in &validated_entities {
            if cancellation.is_cancelled() {
                break;
            }
            let file_type = crate::entity::FileType::from(file_type_tag.as_str());
            let Some(format) = registry.get(&file_type) else { continue };

            let dest_table = TableHandle::from(format!("{file_type_tag}_table").as_str());
            let mut process_kwargs = KwargMap::new();
            process_kwargs.insert(
                "new_path",
                crate::dataset::KwargValue::Str(
                    center_scratch_dir.join(file_type_tag).display().to_string(),
                ),
            );
            process_kwargs.insert(
                "database_syn_id",
                crate::dataset::KwargValue::SynId(dest_table.0.clone()),
            );
            process_kwargs.insert(
                "parent_id",
                crate::dataset::KwargValue::SynId(center.0.clone()),
            );

            for unit in group_into_submission_units(entities.clone()) {
                let dataset = format.read(&unit)?;
                let processed = format.process(dataset, &process_kwargs)?;
                let existing = with_retry(&ctx.gateway_policy, || gateway.query_table(&dest_table)).await?;
                let delta = reconcile(&existing, &processed.frame, &format.primary_key(), true)?;
                with_retry(&ctx.gateway_policy, || gateway.apply_delta(&dest_table, delta.clone())).await?;
            }
        }
    }

    // Step 8: upload per-center log artifact.
    let invalid_count = new_status_rows.iter().filter(|r| r.status == ValidationStatus::Invalid).count();
    let validated_count = new_status_rows.len() - invalid_count;
    upload_and_return(gateway, center, center_log, (validated_count, invalid_count)).await
}

async fn upload_and_return(
    gateway: &dyn Gateway,
    center: &Center,
    center_log: CenterLog,
    counts: (usize, usize),
) -> PipelineResult<(usize, usize)> {
    let bytes = center_log.read_bytes().map_err(PipelineError::Io)?;
    gateway.upload_artifact(center, "run.jsonl", &bytes).await?;
    let _ = center_log.remove();
    Ok(counts)
}

fn status_rows_from_snapshot(frame: &DataFrame, center: &Center) -> PipelineResult<StatusSnapshot> {
    if frame.height() == 0 {
        return Ok(StatusSnapshot::default());
    }
    let ids = frame.column("id").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;
    let md5s = frame.column("md5").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;
    let names = frame.column("name").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;
    let statuses = frame.column("status").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;
    let file_types = frame.column("file_type").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;

    let mut rows = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        rows.push(ValidationStatusRow {
            id: ids.get(i).unwrap_or_default().to_string(),
            md5: md5s.get(i).unwrap_or_default().to_string(),
            status: if statuses.get(i) == Some("VALIDATED") {
                ValidationStatus::Validated
            } else {
                ValidationStatus::Invalid
            },
            name: names.get(i).unwrap_or_default().to_string(),
            center: center.clone(),
            modified_on: chrono::Utc::now(),
            file_type: crate::entity::FileType::from(file_types.get(i).unwrap_or_default()),
        });
    }
    Ok(StatusSnapshot { rows })
}

fn error_rows_from_snapshot(frame: &DataFrame, center: &Center) -> PipelineResult<crate::status::ErrorSnapshot> {
    if frame.height() == 0 {
        return Ok(crate::status::ErrorSnapshot::default());
    }
    let ids = frame.column("id").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;
    let errors = frame.column("errors").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;
    let names = frame.column("name").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;
    let file_types = frame.column("file_type").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;

    let mut rows = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        rows.push(ErrorRow {
            id: ids.get(i).unwrap_or_default().to_string(),
            errors: errors.get(i).unwrap_or_default().to_string(),
            name: names.get(i).unwrap_or_default().to_string(),
            file_type: crate::entity::FileType::from(file_types.get(i).unwrap_or_default()),
            center: center.clone(),
        });
    }
    Ok(crate::status::ErrorSnapshot { rows })
}

fn status_rows_to_frame(rows: &[ValidationStatusRow]) -> PipelineResult<DataFrame> {
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    let md5s: Vec<&str> = rows.iter().map(|r| r.md5.as_str()).collect();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    let statuses: Vec<&str> = rows.iter().map(|r| r.status.as_str()).collect();
    let centers: Vec<&str> = rows.iter().map(|r| r.center.0.as_str()).collect();
    let modified_ons: Vec<String> = rows.iter().map(|r| r.modified_on.to_rfc3339()).collect();
    let file_types: Vec<&str> = rows.iter().map(|r| r.file_type.0.as_str()).collect();

    DataFrame::new(vec![
        Series::new("id".into(), ids).into(),
        Series::new("md5".into(), md5s).into(),
        Series::new("status".into(), statuses).into(),
        Series::new("name".into(), names).into(),
        Series::new("center".into(), centers).into(),
        Series::new("modified_on".into(), modified_ons).into(),
        Series::new("file_type".into(), file_types).into(),
    ])
    .map_err(PipelineError::Polars)
}

fn error_rows_to_frame(rows: &[ErrorRow]) -> PipelineResult<DataFrame> {
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    let errors: Vec<&str> = rows.iter().map(|r| r.errors.as_str()).collect();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    let centers: Vec<&str> = rows.iter().map(|r| r.center.0.as_str()).collect();
    let file_types: Vec<&str> = rows.iter().map(|r| r.file_type.0.as_str()).collect();

    DataFrame::new(vec![
        Series::new("id".into(), ids).into(),
        Series::new("errors".into(), errors).into(),
        Series::new("name".into(), names).into(),
        Series::new("center".into(), centers).into(),
        Series::new("file_type".into(), file_types).into(),
    ])
    .map_err(PipelineError::Polars)
}

