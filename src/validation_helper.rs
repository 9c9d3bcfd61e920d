//! Validation Helper (spec.md §4.3), grounded directly on
//! `original_source/validate.py`'s `ValidationHelper.determine_filetype` /
//! `validate_single_file` / `collect_errors_and_warnings`.

use crate::dataset::KwargMap;
use crate::entity::{Entity, FileType};
use crate::error::PipelineResult;
use crate::format::FileFormat;
use crate::registry::FormatRegistry;

const CANONICAL_FILENAME_ERROR: &str =
    "Your filename is incorrect! Please change the filename before you run the validator or specify --filetype if you are running the validator locally";

const CANONICAL_SUCCESS_MESSAGE: &str = "YOUR FILE IS VALIDATED!\n";

/// Determine, validate, and assemble the report string for one submission
/// unit. A default implementation is registered by
/// [`DefaultValidationHelper`]; extension packages may supply their own to
/// customize filetype detection or report wording.
pub trait ValidationHelper: Send + Sync {
    fn determine_filetype(
        &self,
        registry: &FormatRegistry,
        entities: &[Entity],
    ) -> Option<FileType> {
        if let Some(override_type) = entities.iter().find_map(|e| e.filetype_override()) {
            return Some(override_type);
        }
        let filenames: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();
        registry
            .in_registration_order()
            .iter()
            .find(|f| f.filetype_matches(&filenames))
            .map(|f| f.file_type())
    }

    fn validate_single(
        &self,
        registry: &FormatRegistry,
        entities: &[Entity],
        kwargs: &KwargMap,
    ) -> PipelineResult<(bool, String)> {
        let Some(file_type) = self.determine_filetype(registry, entities) else {
            return Ok((false, CANONICAL_FILENAME_ERROR.to_string()));
        };
        let format = registry
            .get(&file_type)
            .expect("determine_filetype only returns registered types");

        let dataset = match format.read(entities) {
            Ok(dataset) => dataset,
            Err(err) => {
                let paths: Vec<String> = entities
                    .iter()
                    .map(|e| {
                        e.path
                            .as_ref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| e.name.clone())
                    })
                    .collect();
                let error_line = format!("Could not read {}: {}", paths.join(", "), err);
                return Ok((false, assemble_report(&error_line, "")));
            }
        };

        let (errors, warnings) = format.validate(&dataset, kwargs)?;
        if errors.is_empty() && warnings.is_empty() {
            return Ok((true, CANONICAL_SUCCESS_MESSAGE.to_string()));
        }
        Ok((errors.is_empty(), assemble_report(&errors, &warnings)))
    }
}

/// Aggregate an errors string and a warnings string into one report, per
/// the original pipeline's `collect_errors_and_warnings` banner format.
fn assemble_report(errors: &str, warnings: &str) -> String {
    let mut report = String::new();
    if !errors.is_empty() {
        report.push_str("--- ERRORS ---\n");
        report.push_str(errors);
        report.push('\n');
    }
    if !warnings.is_empty() {
        report.push_str("--- WARNINGS ---\n");
        report.push_str(warnings);
        report.push('\n');
    }
    if report.is_empty() {
        report.push_str(CANONICAL_SUCCESS_MESSAGE);
    }
    report
}

/// The stock `ValidationHelper`: uses the trait's default behavior
/// unmodified. Registered by default in `registry::RegistryBuilder` unless
/// an extension package supplies its own.
pub struct DefaultValidationHelper;

impl ValidationHelper for DefaultValidationHelper {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::entity::Center;
    use crate::format::PrimaryKey;
    use crate::registry::RegistryBuilder;
    use chrono::Utc;
    use polars::prelude::DataFrame;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct PatientFormat;

    impl FileFormat for PatientFormat {
        fn file_type(&self) -> FileType {
            FileType::from("patient")
        }
        fn filetype_matches(&self, filenames: &[String]) -> bool {
            filenames.iter().any(|f| f.contains("patient"))
        }
        fn read(&self, _entities: &[Entity]) -> PipelineResult<Dataset> {
            Ok(Dataset::new(DataFrame::empty(), vec!["patient.csv".to_string()]))
        }
        fn validate(&self, _dataset: &Dataset, _kwargs: &KwargMap) -> PipelineResult<(String, String)> {
            Ok((String::new(), String::new()))
        }
        fn process(&self, dataset: Dataset, _kwargs: &KwargMap) -> PipelineResult<Dataset> {
            Ok(dataset)
        }
        fn primary_key(&self) -> PrimaryKey {
            PrimaryKey(vec!["id".to_string()])
        }
    }

    fn entity(name: &str) -> Entity {
        Entity {
            id: "syn1".into(),
            name: name.into(),
            md5: "m".into(),
            size: 1,
            created_by: "alice".into(),
            modified_by: "alice".into(),
            modified_on: Utc::now(),
            path: None,
            annotations: HashMap::new(),
        }
    }

    #[test]
    fn unknown_filetype_yields_canonical_error() {
        let _ = Center::from("CTR1");
        let registry = RegistryBuilder::new()
            .register("test_pkg", vec![Arc::new(PatientFormat) as Arc<dyn FileFormat>])
            .with_validation_helper(Arc::new(DefaultValidationHelper))
            .build()
            .unwrap();
        let helper = DefaultValidationHelper;
        let (valid, report) = helper
            .validate_single(&registry, &[entity("mystery.csv")], &KwargMap::new())
            .unwrap();
        assert!(!valid);
        assert_eq!(report, CANONICAL_FILENAME_ERROR);
    }

    #[test]
    fn matching_filetype_validates_successfully() {
        let registry = RegistryBuilder::new()
            .register("test_pkg", vec![Arc::new(PatientFormat) as Arc<dyn FileFormat>])
            .with_validation_helper(Arc::new(DefaultValidationHelper))
            .build()
            .unwrap();
        let helper = DefaultValidationHelper;
        let (valid, report) = helper
            .validate_single(&registry, &[entity("patient.csv")], &KwargMap::new())
            .unwrap();
        assert!(valid);
        assert_eq!(report, CANONICAL_SUCCESS_MESSAGE);
    }
}
