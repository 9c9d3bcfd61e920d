//! `validate-single-file` (spec.md §6): run validation against one
//! submission unit supplied as local file paths, print the report, and
//! exit with its pass/fail outcome. Grounded on
//! `original_source/validate.py`'s CLI entry point, which accepts the
//! same shape of arguments (file paths, center, optional filetype
//! override, optional upload destination).

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;

use crate::commands::build_registry;
use crate::dataset::KwargMap;
use crate::entity::{Center, Entity};
use crate::error::{PipelineError, PipelineResult};
use crate::gateway::Gateway;

pub struct Args {
    pub filepaths: Vec<String>,
    pub center: String,
    pub filetype: Option<String>,
    pub parentid: Option<String>,
    pub format_registry_packages: Vec<String>,
}

/// Runs the command, returning `Ok(true)` iff the submission unit is
/// valid. The caller maps this to an exit code.
pub async fn run(gateway: &dyn Gateway, args: Args) -> PipelineResult<bool> {
    let registry = build_registry(&args.format_registry_packages)?;
    let center = Center::from(args.center.as_str());

    let mut entities = Vec::with_capacity(args.filepaths.len());
    for filepath in &args.filepaths {
        let path = PathBuf::from(filepath);
        let metadata = std::fs::metadata(&path).map_err(PipelineError::Io)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filepath.clone());
        let mut annotations = HashMap::new();
        if let Some(filetype) = &args.filetype {
            annotations.insert("filetype".to_string(), serde_json::json!(filetype));
        }
        let user = whoami::username();
        entities.push(Entity {
            id: filepath.clone(),
            name,
            md5: crate::logging::compute_sha256(&path),
            size: metadata.len(),
            created_by: user.clone(),
            modified_by: user,
            modified_on: Utc::now(),
            path: Some(path),
            annotations,
        });
    }

    let (valid, report) = registry
        .validation_helper()
        .validate_single(&registry, &entities, &KwargMap::new())?;
    println!("{report}");

    if valid {
        if let Some(parentid) = &args.parentid {
            let target = Center::from(parentid.as_str());
            for entity in &entities {
                let bytes = std::fs::read(entity.path.as_ref().expect("just set above")).map_err(PipelineError::Io)?;
                gateway.upload_artifact(&target, &entity.name, &bytes).await?;
            }
        }
    }

    Ok(valid)
}
