//! Single-file patient format, grounded on
//! `original_source/example_registry/csv.py`'s `Csv` (a concrete
//! `FileTypeFormat` subclass) and the base class's `_get_dataframe` in
//! `original_source/synapsegenie/example_filetype_format.py`: one
//! tab-separated file, here checked for a `PATIENT_ID` column instead of
//! the example's `valid` column.

use polars::prelude::*;

use crate::dataset::{require_kwargs, Dataset, KwargMap};
use crate::drivers::read_tsv;
use crate::entity::{Entity, FileType};
use crate::error::{PipelineError, PipelineResult};
use crate::format::{FileFormat, PrimaryKey};

const PATIENT_ID_COL: &str = "PATIENT_ID";

pub struct PatientFormat;

impl FileFormat for PatientFormat {
    fn file_type(&self) -> FileType {
        FileType::from("patient")
    }

    fn filetype_matches(&self, filenames: &[String]) -> bool {
        filenames.len() == 1
            && filenames[0].to_lowercase().contains("patient")
            && !filenames[0].to_lowercase().contains("sample")
    }

    fn required_process_kwargs(&self) -> &'static [&'static str] {
        &["new_path", "database_syn_id"]
    }

    fn read(&self, entities: &[Entity]) -> PipelineResult<Dataset> {
        let [entity] = entities else {
            return Err(PipelineError::InvariantViolation(
                "patient format reads exactly one entity".to_string(),
            ));
        };
        let path = entity.path.as_ref().ok_or_else(|| PipelineError::ReadFailure {
            path: entity.name.clone(),
            source: "entity has not been downloaded".to_string(),
        })?;
        let frame = read_tsv(path).map_err(|e| PipelineError::ReadFailure {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
        Ok(Dataset::new(frame, vec![entity.name.clone()]))
    }

    fn validate(&self, dataset: &Dataset, _kwargs: &KwargMap) -> PipelineResult<(String, String)> {
        let mut errors = Vec::new();
        let warnings = Vec::new();

        match dataset.frame.column(PATIENT_ID_COL) {
            Err(_) => errors.push(format!("Patient file: Must have {PATIENT_ID_COL} column.")),
            Ok(series) => {
                let null_count = series.null_count();
                if null_count > 0 {
                    errors.push(format!(
                        "Patient file: {PATIENT_ID_COL} must not contain empty values ({null_count} found)."
                    ));
                }
            }
        }

        Ok((errors.join("\n"), warnings.join("\n")))
    }

    fn process(&self, dataset: Dataset, kwargs: &KwargMap) -> PipelineResult<Dataset> {
        require_kwargs(kwargs, self.required_process_kwargs())?;
        Ok(dataset)
    }

    fn primary_key(&self) -> PrimaryKey {
        PrimaryKey(vec![PATIENT_ID_COL.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::KwargValue;

    #[test]
    fn matches_patient_filename_only() {
        let format = PatientFormat;
        assert!(format.filetype_matches(&["patient.txt".to_string()]));
        assert!(!format.filetype_matches(&["patient_sample.txt".to_string()]));
        assert!(!format.filetype_matches(&["sample.txt".to_string(), "patient.txt".to_string()]));
    }

    #[test]
    fn validate_flags_missing_column() {
        let format = PatientFormat;
        let frame = df! { "OTHER" => &["a", "b"] }.unwrap();
        let dataset = Dataset::new(frame, vec!["patient.txt".to_string()]);
        let (errors, _warnings) = format.validate(&dataset, &KwargMap::new()).unwrap();
        assert!(errors.contains(PATIENT_ID_COL));
    }

    #[test]
    fn validate_passes_clean_file() {
        let format = PatientFormat;
        let frame = df! { PATIENT_ID_COL => &["P1", "P2"] }.unwrap();
        let dataset = Dataset::new(frame, vec!["patient.txt".to_string()]);
        let (errors, warnings) = format.validate(&dataset, &KwargMap::new()).unwrap();
        assert!(errors.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn process_requires_kwargs() {
        let format = PatientFormat;
        let frame = df! { PATIENT_ID_COL => &["P1"] }.unwrap();
        let dataset = Dataset::new(frame, vec!["patient.txt".to_string()]);
        let err = format.process(dataset, &KwargMap::new()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingParameter("new_path")));

        let mut kwargs = KwargMap::new();
        kwargs.insert("new_path", KwargValue::Str("/tmp/out".to_string()));
        kwargs.insert("database_syn_id", KwargValue::SynId("syn1".to_string()));
        let frame = df! { PATIENT_ID_COL => &["P1"] }.unwrap();
        let dataset = Dataset::new(frame, vec!["patient.txt".to_string()]);
        assert!(format.process(dataset, &kwargs).is_ok());
    }
}
