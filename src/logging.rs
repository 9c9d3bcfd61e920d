//! Structured audit logging.
//!
//! A daily JSON-lines file under `logs/` records one [`schema::AuditLogEntry`]
//! per pipeline event, mirroring a long-lived audit trail. A per-center run
//! additionally gets its own scoped log file (see [`center`]) that is
//! uploaded to the platform as an artifact once the center's pipeline
//! finishes, matching the "Logger & Artifact Sink" component.

pub mod center;
pub mod schema;
pub mod verify;
pub mod writer;

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Ensure `logs/` exists, creating it if missing.
pub(crate) fn ensure_logs_dir() -> PathBuf {
    let dir = PathBuf::from("logs");
    if !dir.exists() {
        fs::create_dir_all(&dir).expect("cannot create logs directory");
    }
    dir
}

/// Compute the SHA-256 of a file, for sealing a rotated-out log file.
pub fn compute_sha256(path: &Path) -> String {
    let file = File::open(path).expect("cannot open log file for hashing");
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer).expect("failed to read file");
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    format!("{:x}", hasher.finalize())
}

fn append_to_ledger(filename: &str, hash: &str) {
    let ledger_path = ensure_logs_dir().join("hash_ledger.txt");
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(ledger_path)
        .expect("cannot open hash_ledger.txt");
    let line = format!("{} {} {}\n", Utc::now().to_rfc3339(), filename, hash);
    f.write_all(line.as_bytes()).expect("cannot write to ledger");
}

/// Seal all unsealed log files (older than today, not yet in the ledger).
fn seal_unsealed_logs(logs_dir: &Path, today: &str) {
    let ledger_path = logs_dir.join("hash_ledger.txt");
    let ledger_contents = fs::read_to_string(&ledger_path).unwrap_or_default();

    let entries = match fs::read_dir(logs_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries {
        let entry = entry.expect("bad dir entry");
        let path = entry.path();
        if path.is_file() {
            if let Some(fname) = path.file_name().and_then(|s| s.to_str()) {
                if fname.starts_with("audit-") && fname.ends_with(".jsonl") {
                    if fname.contains(today) {
                        continue;
                    }
                    if ledger_contents.contains(fname) {
                        continue;
                    }
                    let hash = compute_sha256(&path);
                    append_to_ledger(fname, &hash);
                }
            }
        }
    }
}

/// Initialize global process logging: daily rotation of the audit trail
/// plus sealing of any logs left over from previous days.
///
/// `verbose` mirrors the CLI's `-v` flag (spec.md §6): it lowers the
/// default filter to `debug` when `RUST_LOG` isn't set, rather than
/// overriding an operator's explicit `RUST_LOG`.
pub fn init_logging(verbose: bool) {
    let logs_dir = ensure_logs_dir();
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let log_filename = format!("audit-{}.jsonl", today);
    let log_path = logs_dir.join(&log_filename);

    seal_unsealed_logs(&logs_dir, &today);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .expect("cannot open daily audit log file");

    let user = env::var("CENTER_INGEST_EXECUTOR_ID").unwrap_or_else(|_| whoami::username());
    let host = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .json()
        .with_writer(file)
        .with_current_span(false)
        .with_span_list(false)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    info!(user=%user, host=%host, event="startup", "logging initialized");
}

/// Current executor identity, used to stamp every [`schema::AuditLogEntry`].
pub fn current_executor() -> schema::Executor {
    let host = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    schema::Executor {
        user: env::var("CENTER_INGEST_EXECUTOR_ID").unwrap_or_else(|_| whoami::username()),
        host,
    }
}
