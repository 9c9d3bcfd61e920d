use serde::{Deserialize, Serialize};

/// Top-level audit log entry. Each line of `logs/audit-YYYY-MM-DD.jsonl`
/// and of a per-center log file is one of these, serialized as JSON.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: String,
    pub level: &'static str,
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    pub executor: Executor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The file and, when relevant, the submission unit a log line concerns.
#[derive(Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Executor {
    pub user: String,
    pub host: String,
}

impl AuditLogEntry {
    pub fn new(event: &'static str, executor: Executor) -> Self {
        AuditLogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: "AUDIT",
            event,
            center: None,
            file_type: None,
            target: None,
            executor,
            details: None,
        }
    }

    pub fn with_center(mut self, center: impl Into<String>) -> Self {
        self.center = Some(center.into());
        self
    }

    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
