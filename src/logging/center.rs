//! Per-center log capture (spec §4.7/§4.9: "a per-center log file captured
//! for the duration of a run and deposited to a configured log folder on
//! the platform").

use super::schema::AuditLogEntry;
use super::writer::append_to;
use std::path::{Path, PathBuf};

/// A log file scoped to one center's pipeline run. Every event logged
/// through this handle is appended both to the global audit trail (via
/// [`super::writer::log_event`]) and to this center-scoped file, so the
/// artifact uploaded to the platform is a complete, self-contained record
/// of the run.
pub struct CenterLog {
    path: PathBuf,
    center: String,
}

impl CenterLog {
    /// Open (creating if needed) `<log_dir>/<center>_<suffix>.jsonl`.
    pub fn open(log_dir: &Path, center: &str, suffix: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let path = log_dir.join(format!("{center}_{suffix}.jsonl"));
        // Truncate any log left over from a previous run of this center.
        std::fs::File::create(&path)?;
        Ok(CenterLog {
            path,
            center: center.to_string(),
        })
    }

    pub fn center(&self) -> &str {
        &self.center
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an event in both the global audit trail and this run's file.
    pub fn record(&self, entry: &AuditLogEntry) {
        super::writer::log_event(entry);
        append_to(&self.path, entry);
    }

    /// Read back the file's bytes, for handing to the gateway's artifact
    /// upload call.
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    /// Remove the local copy once it has been uploaded.
    pub fn remove(self) -> std::io::Result<()> {
        std::fs::remove_file(&self.path)
    }
}
