//! Two-file patient+sample clinical format, grounded on the same
//! `FileTypeFormat` base class as [`super::patient::PatientFormat`]
//! (`original_source/synapsegenie/example_filetype_format.py`, concrete
//! subclass example at `original_source/example_registry/csv.py`),
//! extended here to read two files and cross-check `PATIENT_ID` between
//! them.

use polars::prelude::*;

use crate::dataset::{require_kwargs, Dataset, KwargMap};
use crate::drivers::read_tsv;
use crate::entity::{Entity, FileType};
use crate::error::{PipelineError, PipelineResult};
use crate::format::{FileFormat, PrimaryKey};

const PATIENT_ID_COL: &str = "PATIENT_ID";
const SAMPLE_ID_COL: &str = "SAMPLE_ID";
const SOURCE_COL: &str = "__source_file__";

pub struct ClinicalFormat;

impl ClinicalFormat {
    fn split(&self, entities: &[Entity]) -> PipelineResult<(&Entity, &Entity)> {
        let [a, b] = entities else {
            return Err(PipelineError::InvariantViolation(
                "clinical format reads exactly two entities".to_string(),
            ));
        };
        if a.name.to_lowercase().contains("sample") && b.name.to_lowercase().contains("patient") {
            Ok((b, a))
        } else if a.name.to_lowercase().contains("patient") && b.name.to_lowercase().contains("sample") {
            Ok((a, b))
        } else {
            Err(PipelineError::InvariantViolation(
                "clinical format needs one patient file and one sample file".to_string(),
            ))
        }
    }
}

impl FileFormat for ClinicalFormat {
    fn file_type(&self) -> FileType {
        FileType::from("clinical")
    }

    fn filetype_matches(&self, filenames: &[String]) -> bool {
        filenames.len() == 2
            && filenames.iter().any(|f| f.to_lowercase().contains("patient"))
            && filenames.iter().any(|f| f.to_lowercase().contains("sample"))
    }

    fn required_process_kwargs(&self) -> &'static [&'static str] {
        &["new_path", "database_syn_id", "parent_id"]
    }

    fn read(&self, entities: &[Entity]) -> PipelineResult<Dataset> {
        let (patient_entity, sample_entity) = self.split(entities)?;

        let read_one = |entity: &Entity, tag: &str| -> PipelineResult<DataFrame> {
            let path = entity.path.as_ref().ok_or_else(|| PipelineError::ReadFailure {
                path: entity.name.clone(),
                source: "entity has not been downloaded".to_string(),
            })?;
            let mut frame = read_tsv(path).map_err(|e| PipelineError::ReadFailure {
                path: path.display().to_string(),
                source: e.to_string(),
            })?;
            frame
                .with_column(Series::new(SOURCE_COL.into(), vec![tag; frame.height()]))
                .map_err(PipelineError::Polars)?;
            Ok(frame)
        };

        let patient_frame = read_one(patient_entity, "patient")?;
        let sample_frame = read_one(sample_entity, "sample")?;

        let combined = concat(
            [patient_frame.lazy(), sample_frame.lazy()],
            UnionArgs {
                diagonal: true,
                ..Default::default()
            },
        )
        .and_then(|lf| lf.collect())
        .map_err(PipelineError::Polars)?;

        Ok(Dataset::new(
            combined,
            vec![patient_entity.name.clone(), sample_entity.name.clone()],
        ))
    }

    fn validate(&self, dataset: &Dataset, _kwargs: &KwargMap) -> PipelineResult<(String, String)> {
        let mut errors = Vec::new();
        let warnings = Vec::new();

        let source = dataset
            .frame
            .column(SOURCE_COL)
            .map_err(PipelineError::Polars)?
            .str()
            .map_err(PipelineError::Polars)?;
        let patient_mask: BooleanChunked = source.into_iter().map(|v| v == Some("patient")).collect();
        let sample_mask: BooleanChunked = source.into_iter().map(|v| v == Some("sample")).collect();

        let patient_rows = dataset.frame.filter(&patient_mask).map_err(PipelineError::Polars)?;
        let sample_rows = dataset.frame.filter(&sample_mask).map_err(PipelineError::Polars)?;

        if patient_rows.column(PATIENT_ID_COL).is_err() {
            errors.push(format!("Patient file: Must have {PATIENT_ID_COL} column."));
        }
        if sample_rows.column(PATIENT_ID_COL).is_err() {
            errors.push(format!("Sample file: Must have {PATIENT_ID_COL} column."));
        }
        if sample_rows.column(SAMPLE_ID_COL).is_err() {
            errors.push(format!("Sample file: Must have {SAMPLE_ID_COL} column."));
        }

        if errors.is_empty() {
            let patient_ids: std::collections::HashSet<String> = patient_rows
                .column(PATIENT_ID_COL)
                .unwrap()
                .str()
                .unwrap()
                .into_iter()
                .flatten()
                .map(str::to_string)
                .collect();
            let orphaned: Vec<String> = sample_rows
                .column(PATIENT_ID_COL)
                .unwrap()
                .str()
                .unwrap()
                .into_iter()
                .flatten()
                .filter(|id| !patient_ids.contains(*id))
                .map(str::to_string)
                .collect();
            if !orphaned.is_empty() {
                errors.push(format!(
                    "Sample file: PATIENT_ID(s) {} not found in patient file.",
                    orphaned.join(", ")
                ));
            }
        }

        Ok((errors.join("\n"), warnings.join("\n")))
    }

    fn process(&self, dataset: Dataset, kwargs: &KwargMap) -> PipelineResult<Dataset> {
        require_kwargs(kwargs, self.required_process_kwargs())?;
        let frame = dataset
            .frame
            .drop(SOURCE_COL)
            .map_err(PipelineError::Polars)?;
        Ok(Dataset::new(frame, dataset.source_names))
    }

    fn primary_key(&self) -> PrimaryKey {
        PrimaryKey(vec![PATIENT_ID_COL.to_string(), SAMPLE_ID_COL.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_one_patient_and_one_sample_file() {
        let format = ClinicalFormat;
        assert!(format.filetype_matches(&["data_patient.txt".to_string(), "data_sample.txt".to_string()]));
        assert!(!format.filetype_matches(&["data_patient.txt".to_string()]));
    }
}
