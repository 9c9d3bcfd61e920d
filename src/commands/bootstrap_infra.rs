//! `bootstrap-infra` (spec.md §6): create the fixed persisted-state
//! tables, the per-center input folders, the per-format output
//! folders/tables, and the project's `dbMapping` annotation. Grounded on
//! `original_source/input_to_database.py`'s one-time project setup
//! routine.

use crate::commands::{build_registry, error_table_handle, status_table_handle, CENTER_MAPPING_TABLE, DB_MAPPING_TABLE};
use crate::error::PipelineResult;
use crate::gateway::{Gateway, TableHandle};

pub struct Args {
    pub project_name: Option<String>,
    pub project_id: Option<String>,
    pub centers: Vec<String>,
    pub format_registry_packages: Vec<String>,
}

pub async fn run(gateway: &dyn Gateway, args: Args) -> PipelineResult<()> {
    let project_id = args
        .project_id
        .clone()
        .unwrap_or_else(|| args.project_name.clone().unwrap_or_default());

    gateway
        .ensure_table(
            &TableHandle::from(CENTER_MAPPING_TABLE),
            &["name", "center", "inputSynId", "release"].into_iter().map(String::from).collect::<Vec<_>>(),
        )
        .await?;
    gateway
        .ensure_table(
            &TableHandle::from(DB_MAPPING_TABLE),
            &["file_type", "table_name"].into_iter().map(String::from).collect::<Vec<_>>(),
        )
        .await?;
    gateway
        .ensure_table(
            &status_table_handle(),
            &["id", "md5", "status", "name", "center", "modified_on", "file_type"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>(),
        )
        .await?;
    gateway
        .ensure_table(
            &error_table_handle(),
            &["id", "errors", "name", "center", "file_type"].into_iter().map(String::from).collect::<Vec<_>>(),
        )
        .await?;

    for center in &args.centers {
        gateway.ensure_container(&format!("{project_id}/input/{center}")).await?;
        println!("provisioned input folder for center {center}");
    }

    // Every registered format gets an output folder and a destination table
    // slot, named by convention "<file_type>_table" (see DESIGN.md). The
    // table itself is left schema-less until the pipeline's first
    // reconciliation pass establishes it from the processed dataset's own
    // columns (spec.md §4.5's "no predeclared schema" edge case).
    let registry = build_registry(&args.format_registry_packages)?;
    for format in registry.in_registration_order() {
        let file_type = format.file_type();
        gateway.ensure_container(&format!("{project_id}/output/{file_type}")).await?;
        let table_name = format!("{file_type}_table");
        gateway.set_annotation(&project_id, &format!("dbMapping.{file_type}"), &table_name).await?;
    }

    println!("bootstrap complete for project {project_id}");
    Ok(())
}
