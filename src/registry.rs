//! Format Registry (spec.md §4.1).
//!
//! The teacher dispatches on a `ContractType` match statement built once
//! per validation run (`engine.rs`); this crate generalizes that into an
//! explicit registration table built once at process start. Per the
//! REDESIGN FLAGS, discovery is an explicit `register(package_name,
//! formats)` builder call per extension package rather than the original
//! pipeline's `importlib`/`__subclasses__` reflection — Rust has no
//! runtime subtype scan, and this is the idiomatic substitute "named
//! extension packages" cashes out to.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity::FileType;
use crate::error::{PipelineError, PipelineResult};
use crate::format::FileFormat;
use crate::validation_helper::ValidationHelper;

/// One extension package's contribution: its formats plus the
/// `ValidationHelper` it wants wired in. Registered in the order packages
/// are added; ties (two formats both matching a filename set) are broken
/// by first-insertion-wins, logged at `warn!` (mirrors the original
/// pipeline's `collect_format_types` semantics).
pub struct FormatEntry {
    pub package_name: &'static str,
    pub format: Arc<dyn FileFormat>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    formats: Vec<FormatEntry>,
    validation_helper: Option<Arc<dyn ValidationHelper>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    /// Register one extension package's formats, in registration order.
    pub fn register(mut self, package_name: &'static str, formats: Vec<Arc<dyn FileFormat>>) -> Self {
        for format in formats {
            self.formats.push(FormatEntry { package_name, format });
        }
        self
    }

    /// Register the `ValidationHelper` to use for filetype detection and
    /// report assembly. Exactly one must be registered; a missing
    /// registration is fatal at build time (an unset `ValidationHelper` is
    /// a configuration error, not a runtime condition to recover from).
    pub fn with_validation_helper(mut self, helper: Arc<dyn ValidationHelper>) -> Self {
        self.validation_helper = Some(helper);
        self
    }

    pub fn build(self) -> PipelineResult<FormatRegistry> {
        let validation_helper = self.validation_helper.ok_or_else(|| {
            PipelineError::InvariantViolation(
                "no ValidationHelper registered".to_string(),
            )
        })?;

        let mut by_type: HashMap<FileType, Arc<dyn FileFormat>> = HashMap::new();
        let mut ordered: Vec<Arc<dyn FileFormat>> = Vec::new();
        for entry in self.formats {
            let file_type = entry.format.file_type();
            if by_type.contains_key(&file_type) {
                tracing::warn!(
                    file_type = %file_type,
                    package = entry.package_name,
                    "duplicate file type registration, keeping first"
                );
                continue;
            }
            by_type.insert(file_type, entry.format.clone());
            ordered.push(entry.format);
        }

        Ok(FormatRegistry {
            by_type,
            ordered,
            validation_helper,
        })
    }
}

/// The built registry: every known format, reachable both by `FileType`
/// and in registration order (the order filetype detection iterates).
pub struct FormatRegistry {
    by_type: HashMap<FileType, Arc<dyn FileFormat>>,
    ordered: Vec<Arc<dyn FileFormat>>,
    validation_helper: Arc<dyn ValidationHelper>,
}

impl FormatRegistry {
    pub fn get(&self, file_type: &FileType) -> Option<&Arc<dyn FileFormat>> {
        self.by_type.get(file_type)
    }

    /// Formats in the order they were registered — the order filetype
    /// detection tries `filetype_matches` against.
    pub fn in_registration_order(&self) -> &[Arc<dyn FileFormat>] {
        &self.ordered
    }

    pub fn validation_helper(&self) -> &Arc<dyn ValidationHelper> {
        &self.validation_helper
    }
}
