//! `process` (spec.md §6): run the per-center pipeline, either for one
//! named center or for every center whose `release` flag is set in the
//! center-mapping table. Grounded on
//! `original_source/input_to_database.py`'s `main` entry point.
//!
//! Centers run concurrently, one `tokio::task` each (spec.md §5's "natural
//! unit of concurrency is one worker per center"): each task gets its own
//! clone of the shared `Arc<dyn Gateway>`/`Arc<FormatRegistry>`/
//! `Arc<dyn Notifier>` and `RunContext`, so no center's task borrows
//! another's state. The status/error tables are shared across every
//! center (`commands::status_table_handle`/`error_table_handle` return the
//! same handle regardless of caller); concurrent tasks never contend on
//! the same row because each filters its own snapshot down to
//! `center = ?` before reading or writing.

use std::sync::Arc;

use crate::commands::{build_registry, error_table_handle, status_table_handle, CENTER_MAPPING_TABLE};
use crate::entity::Center;
use crate::error::{PipelineError, PipelineResult};
use crate::gateway::{Gateway, TableHandle};
use crate::notify::{LoggingNotifier, Notifier};
use crate::pipeline::{run_center, CancellationToken, CenterOutcome};

pub struct Args {
    pub project_id: String,
    pub center: Option<String>,
    pub only_validate: bool,
    pub delete_old: bool,
    pub format_registry_packages: Vec<String>,
}

/// Centers to run: the explicit `--center`, if given, else every center
/// the center-mapping table has `release = true` for (spec.md §6 treats
/// an explicit `--center` as overriding the release filter).
async fn centers_to_run(gateway: &dyn Gateway, args: &Args) -> PipelineResult<Vec<Center>> {
    if let Some(center) = &args.center {
        return Ok(vec![Center::from(center.as_str())]);
    }

    let snapshot = gateway.query_table(&TableHandle::from(CENTER_MAPPING_TABLE)).await?;
    if snapshot.frame.height() == 0 {
        return Ok(Vec::new());
    }
    let centers = snapshot.frame.column("center").map_err(PipelineError::Polars)?.str().map_err(PipelineError::Polars)?;
    let release = snapshot.frame.column("release").map_err(PipelineError::Polars)?.bool().map_err(PipelineError::Polars)?;

    let mut result = Vec::new();
    for i in 0..snapshot.frame.height() {
        if release.get(i) == Some(true) {
            if let Some(name) = centers.get(i) {
                result.push(Center::from(name));
            }
        }
    }
    Ok(result)
}

pub async fn run(
    ctx: &crate::config::RunContext,
    gateway: Arc<dyn Gateway>,
    args: Args,
) -> PipelineResult<Vec<CenterOutcome>> {
    let registry = Arc::new(build_registry(&args.format_registry_packages)?);
    let notifier: Arc<dyn Notifier> = Arc::new(LoggingNotifier);
    let cancellation = CancellationToken::new();

    let centers = centers_to_run(gateway.as_ref(), &args).await?;
    let mut tasks = tokio::task::JoinSet::new();
    for center in centers {
        let ctx = ctx.clone();
        let gateway = Arc::clone(&gateway);
        let notifier = Arc::clone(&notifier);
        let registry = Arc::clone(&registry);
        let cancellation = cancellation.clone();
        let only_validate = args.only_validate;
        let delete_old = args.delete_old;
        tasks.spawn(async move {
            let status_table = status_table_handle();
            let error_table = error_table_handle();
            run_center(
                &ctx,
                gateway.as_ref(),
                notifier.as_ref(),
                &registry,
                center,
                &status_table,
                &error_table,
                only_validate,
                delete_old,
                &cancellation,
            )
            .await
        });
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(result) = tasks.join_next().await {
        let outcome = result.map_err(|e| PipelineError::Other(format!("center task panicked: {e}")))?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}
