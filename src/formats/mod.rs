//! Concrete `FileFormat` implementations. Two registered by default,
//! grounded on `original_source/example_registry/csv.py`'s `Csv` (the only
//! concrete `FileTypeFormat` subclass in the pack) and the base class it
//! extends: a single-file patient format and a two-file patient+sample
//! clinical format.

pub mod clinical;
pub mod patient;

pub use clinical::ClinicalFormat;
pub use patient::PatientFormat;
