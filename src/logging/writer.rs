use super::schema::AuditLogEntry;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Today's global audit log path, `logs/audit-YYYY-MM-DD.jsonl`.
fn today_log_path() -> PathBuf {
    let logs_dir = super::ensure_logs_dir();
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    logs_dir.join(format!("audit-{}.jsonl", today))
}

/// Append an entry to the global audit log.
pub fn log_event(entry: &AuditLogEntry) {
    append_to(&today_log_path(), entry);
}

/// Append an entry to the global audit log and print a console line.
pub fn log_and_print(entry: &AuditLogEntry, console_msg: &str) {
    log_event(entry);
    println!("{}", console_msg);
}

/// Append an entry to an arbitrary JSONL file (used by per-center logs).
pub fn append_to(path: &std::path::Path, entry: &AuditLogEntry) {
    let json = serde_json::to_string(entry).expect("failed to serialize log entry");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap_or_else(|e| panic!("cannot open log file {}: {e}", path.display()));
    writeln!(file, "{}", json).expect("failed to write log entry");
}
