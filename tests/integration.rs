//! End-to-end pipeline tests against the literal scenarios in spec.md §8,
//! driving the full per-center pipeline (enumerate → validate → reconcile
//! status/error tables → process valid files into their format table)
//! through an [`InMemoryGateway`], the same backend the `process`/
//! `get-file-errors` CLI commands run against when no remote profile is
//! configured.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use center_ingest::config::RunContext;
use center_ingest::entity::{Center, Entity};
use center_ingest::error::PipelineResult;
use center_ingest::format::FileFormat;
use center_ingest::formats::{ClinicalFormat, PatientFormat};
use center_ingest::gateway::{Gateway, InMemoryGateway, TableHandle};
use center_ingest::notify::{LoggingNotifier, Notification, Notifier};
use center_ingest::pipeline::{run_center, CancellationToken};
use center_ingest::registry::RegistryBuilder;
use center_ingest::validation_helper::DefaultValidationHelper;
use std::sync::Mutex;

/// Captures delivered notifications for assertions instead of just
/// logging them, mirroring `LoggingNotifier`'s shape.
#[derive(Default)]
struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> PipelineResult<()> {
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
use chrono::Utc;
use tempfile::tempdir;

fn registry() -> center_ingest::registry::FormatRegistry {
    RegistryBuilder::new()
        .register(
            "builtin",
            vec![
                Arc::new(PatientFormat) as Arc<dyn FileFormat>,
                Arc::new(ClinicalFormat) as Arc<dyn FileFormat>,
            ],
        )
        .with_validation_helper(Arc::new(DefaultValidationHelper))
        .build()
        .unwrap()
}

fn write_patient_file(dir: &std::path::Path, filename: &str, patient_ids: &[&str]) -> std::path::PathBuf {
    let path = dir.join(filename);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "PATIENT_ID").unwrap();
    for id in patient_ids {
        writeln!(file, "{id}").unwrap();
    }
    path
}

fn seed_entity(gateway: &InMemoryGateway, id: &str, name: &str, path: std::path::PathBuf) {
    seed_entity_owned_by(gateway, id, name, path, "alice");
}

fn seed_entity_owned_by(gateway: &InMemoryGateway, id: &str, name: &str, path: std::path::PathBuf, owner: &str) {
    let md5 = center_ingest::logging::compute_sha256(&path);
    gateway.seed_entity(Entity {
        id: id.to_string(),
        name: name.to_string(),
        md5,
        size: std::fs::metadata(&path).unwrap().len(),
        created_by: owner.to_string(),
        modified_by: owner.to_string(),
        modified_on: Utc::now(),
        path: Some(path),
        annotations: HashMap::new(),
    });
}

fn run_ctx(dir: &std::path::Path) -> RunContext {
    let mut ctx = RunContext::new("proj1");
    ctx.log_dir = dir.join("logs");
    ctx.scratch_dir = dir.join("scratch");
    ctx
}

#[tokio::test]
async fn append_only_validates_and_populates_status_table() {
    let tmp = tempdir().unwrap();
    let gateway = InMemoryGateway::new();
    let center = Center::from("CTR1");
    let registry = registry();
    let notifier = LoggingNotifier;
    let cancellation = CancellationToken::new();

    let path = write_patient_file(tmp.path(), "patient_CTR1.txt", &["P1", "P2"]);
    seed_entity(&gateway, "syn1", "patient_CTR1.txt", path);
    gateway.seed_container(&center, vec!["syn1".to_string()]);

    let status_table = TableHandle::from("validationStatus");
    let error_table = TableHandle::from("errorTracker");
    let ctx = run_ctx(tmp.path());

    let outcome = run_center(
        &ctx,
        &gateway,
        &notifier,
        &registry,
        center,
        &status_table,
        &error_table,
        false,
        false,
        &cancellation,
    )
    .await;

    assert!(outcome.fatal.is_none());
    assert_eq!(outcome.validated, 1);
    assert_eq!(outcome.invalid, 0);
    assert_eq!(gateway.table_height(&status_table), 1);
    assert_eq!(gateway.table_height(&error_table), 0);

    let dest_table = TableHandle::from("patient_table");
    assert_eq!(gateway.table_height(&dest_table), 2);
}

#[tokio::test]
async fn duplicate_filenames_are_flagged_invalid() {
    let tmp = tempdir().unwrap();
    let gateway = InMemoryGateway::new();
    let center = Center::from("CTR1");
    let registry = registry();
    let notifier = RecordingNotifier::default();
    let cancellation = CancellationToken::new();

    // Two distinct entities sharing a name, owned by two different
    // submitters: genuinely duplicated filenames (spec.md §8's literal
    // scenario — "notifier sends one email per distinct owner").
    let dir_a = tmp.path().join("a");
    let dir_b = tmp.path().join("b");
    std::fs::create_dir_all(&dir_a).unwrap();
    std::fs::create_dir_all(&dir_b).unwrap();
    let path_a = write_patient_file(&dir_a, "data_CTR1.txt", &["P1"]);
    let path_b = write_patient_file(&dir_b, "data_CTR1.txt", &["P2"]);

    seed_entity_owned_by(&gateway, "syn1", "data_CTR1.txt", path_a, "alice");
    seed_entity_owned_by(&gateway, "syn2", "data_CTR1.txt", path_b, "bob");
    gateway.seed_container(&center, vec!["syn1".to_string(), "syn2".to_string()]);

    let status_table = TableHandle::from("validationStatus");
    let error_table = TableHandle::from("errorTracker");
    let ctx = run_ctx(tmp.path());

    let outcome = run_center(
        &ctx,
        &gateway,
        &notifier,
        &registry,
        center,
        &status_table,
        &error_table,
        true,
        false,
        &cancellation,
    )
    .await;

    assert!(outcome.fatal.is_none());
    assert_eq!(outcome.invalid, 2);
    assert_eq!(gateway.table_height(&status_table), 2);

    // Both files passed their own format's validator cleanly and were
    // only invalidated by the duplicate-filename pass, which runs after
    // per-file validation -- notifications must still reach both owners.
    let delivered = notifier.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 2);
    let recipients: std::collections::HashSet<&str> = delivered.iter().map(|n| n.recipient.as_str()).collect();
    assert!(recipients.contains("alice") && recipients.contains("bob"));
    assert!(delivered.iter().all(|n| n.body.contains("data_CTR1.txt")));

    let error_snapshot = gateway.query_table(&error_table).await.unwrap();
    assert_eq!(error_snapshot.frame.height(), 2);
    let errors = error_snapshot.frame.column("errors").unwrap().str().unwrap();
    assert!(errors.into_iter().all(|e| e.unwrap().contains("Duplicated filename")));
}

#[tokio::test]
async fn unchanged_second_run_emits_no_status_changes() {
    let tmp = tempdir().unwrap();
    let gateway = InMemoryGateway::new();
    let center = Center::from("CTR1");
    let registry = registry();
    let notifier = LoggingNotifier;
    let cancellation = CancellationToken::new();

    let path = write_patient_file(tmp.path(), "patient_CTR1.txt", &["P1"]);
    seed_entity(&gateway, "syn1", "patient_CTR1.txt", path);
    gateway.seed_container(&center, vec!["syn1".to_string()]);

    let status_table = TableHandle::from("validationStatus");
    let error_table = TableHandle::from("errorTracker");
    let ctx = run_ctx(tmp.path());

    run_center(
        &ctx,
        &gateway,
        &notifier,
        &registry,
        center.clone(),
        &status_table,
        &error_table,
        true,
        false,
        &cancellation,
    )
    .await;
    let first_snapshot = gateway.query_table(&status_table).await.unwrap();
    let first_locator = first_snapshot.row_locators[0].clone();

    run_center(
        &ctx,
        &gateway,
        &notifier,
        &registry,
        center,
        &status_table,
        &error_table,
        true,
        false,
        &cancellation,
    )
    .await;
    let second_snapshot = gateway.query_table(&status_table).await.unwrap();

    assert_eq!(second_snapshot.frame.height(), 1);
    assert_eq!(second_snapshot.row_locators[0], first_locator);
}

#[tokio::test]
async fn invalid_file_fixed_on_next_run_clears_error_row() {
    let tmp = tempdir().unwrap();
    let gateway = InMemoryGateway::new();
    let center = Center::from("CTR1");
    let registry = registry();
    let notifier = LoggingNotifier;
    let cancellation = CancellationToken::new();
    let ctx = run_ctx(tmp.path());

    // First run: patient file missing PATIENT_ID, hence invalid.
    let bad_path = tmp.path().join("patient_CTR1.txt");
    {
        let mut file = std::fs::File::create(&bad_path).unwrap();
        writeln!(file, "OTHER_COL").unwrap();
        writeln!(file, "x").unwrap();
    }
    seed_entity(&gateway, "syn1", "patient_CTR1.txt", bad_path);
    gateway.seed_container(&center, vec!["syn1".to_string()]);

    let status_table = TableHandle::from("validationStatus");
    let error_table = TableHandle::from("errorTracker");

    let outcome = run_center(
        &ctx, &gateway, &notifier, &registry, center.clone(), &status_table, &error_table, true, false, &cancellation,
    )
    .await;
    assert_eq!(outcome.invalid, 1);
    assert_eq!(gateway.table_height(&error_table), 1);

    // Second run: same id, fixed content (different md5) -> revalidates and passes.
    let fixed_path = write_patient_file(tmp.path(), "patient_CTR1.txt", &["P1"]);
    gateway.seed_entity(Entity {
        id: "syn1".to_string(),
        name: "patient_CTR1.txt".to_string(),
        md5: center_ingest::logging::compute_sha256(&fixed_path),
        size: std::fs::metadata(&fixed_path).unwrap().len(),
        created_by: "alice".to_string(),
        modified_by: "alice".to_string(),
        modified_on: Utc::now(),
        path: Some(fixed_path),
        annotations: HashMap::new(),
    });

    let outcome = run_center(
        &ctx, &gateway, &notifier, &registry, center, &status_table, &error_table, true, false, &cancellation,
    )
    .await;
    assert_eq!(outcome.validated, 1);
    assert_eq!(outcome.invalid, 0);
    assert_eq!(gateway.table_height(&error_table), 0);
}

#[tokio::test]
async fn entity_disappearing_from_container_deletes_its_rows() {
    let tmp = tempdir().unwrap();
    let gateway = InMemoryGateway::new();
    let center = Center::from("CTR1");
    let registry = registry();
    let notifier = LoggingNotifier;
    let cancellation = CancellationToken::new();
    let ctx = run_ctx(tmp.path());

    let path = write_patient_file(tmp.path(), "patient_CTR1.txt", &["P1"]);
    seed_entity(&gateway, "syn1", "patient_CTR1.txt", path);
    gateway.seed_container(&center, vec!["syn1".to_string()]);

    let status_table = TableHandle::from("validationStatus");
    let error_table = TableHandle::from("errorTracker");

    run_center(
        &ctx, &gateway, &notifier, &registry, center.clone(), &status_table, &error_table, true, false, &cancellation,
    )
    .await;
    assert_eq!(gateway.table_height(&status_table), 1);

    // The entity vanishes from the center's input container on the next run.
    gateway.seed_container(&center, vec![]);
    let outcome = run_center(
        &ctx, &gateway, &notifier, &registry, center, &status_table, &error_table, true, false, &cancellation,
    )
    .await;

    assert!(outcome.fatal.is_none());
    assert_eq!(gateway.table_height(&status_table), 0);
}
