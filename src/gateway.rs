//! Platform Gateway (spec.md §2/§6): a thin adapter over the remote
//! object/table service. Generalizes a `Connector` trait pattern
//! (`list`/`fetch` over a storage backend) into the richer surface this
//! domain needs: entity enumeration, tabular query, and delta application.
//!
//! The concrete wire calls (object download, table query/insert/delete)
//! are out of scope (spec.md §1's "out of scope" list) — this module is
//! the narrow interface the core consumes, plus one concrete in-memory
//! backend for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::entity::{Center, Entity};
use crate::error::PipelineResult;
use crate::reconcile::{RowLocator, TableDelta, TableSnapshot};

/// One table the platform exposes, by name, scoped to a center.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableHandle(pub String);

impl From<&str> for TableHandle {
    fn from(s: &str) -> Self {
        TableHandle(s.to_string())
    }
}

/// Thin adapter over the remote object/table service (spec.md §2).
#[async_trait]
pub trait Gateway: Send + Sync {
    /// List the ids of entities in a center's input container.
    async fn list_container(&self, center: &Center) -> PipelineResult<Vec<String>>;

    /// Fetch one entity's metadata, downloading its content to a local
    /// path if `download` is set.
    async fn fetch_entity(&self, id: &str, download: bool) -> PipelineResult<Entity>;

    /// Run a tabular query, returning a snapshot with row identifiers.
    async fn query_table(&self, table: &TableHandle) -> PipelineResult<TableSnapshot>;

    /// Apply a row-level delta to a table in one bulk call.
    async fn apply_delta(&self, table: &TableHandle, delta: TableDelta) -> PipelineResult<()>;

    /// Upload a completed per-center log file as a run artifact.
    async fn upload_artifact(&self, center: &Center, name: &str, bytes: &[u8]) -> PipelineResult<()>;

    /// Idempotently ensure a table exists with the given columns
    /// (`bootstrap-infra`'s fixed four tables, and `replace-db`'s new
    /// destination table). A no-op if the table already exists.
    async fn ensure_table(&self, table: &TableHandle, columns: &[String]) -> PipelineResult<()>;

    /// Idempotently ensure a named container (a center's input folder, a
    /// format's output folder) exists, returning its id.
    async fn ensure_container(&self, name: &str) -> PipelineResult<String>;

    /// Set a single annotation key/value on a project-level target, e.g.
    /// the `dbMapping` annotation `bootstrap-infra`/`replace-db` writes.
    async fn set_annotation(&self, target: &str, key: &str, value: &str) -> PipelineResult<()>;

    /// Read back a previously-set annotation, e.g. `replace-db`'s lookup
    /// of the file type's current destination table before rewiring it.
    async fn get_annotation(&self, target: &str, key: &str) -> PipelineResult<Option<String>>;
}

/// An in-memory `Gateway` for tests and local dry-runs: entities and
/// tables are plain in-process maps, mirroring a `LocalConnector`-style
/// pattern (a filesystem-backed `Connector` used in integration tests)
/// but for the table-query/delta surface this domain needs instead of
/// object listing.
#[derive(Default)]
pub struct InMemoryGateway {
    containers: Mutex<HashMap<String, Vec<String>>>,
    entities: Mutex<HashMap<String, Entity>>,
    tables: Mutex<HashMap<String, (polars::prelude::DataFrame, Vec<RowLocator>)>>,
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
    annotations: Mutex<HashMap<(String, String), String>>,
    next_row_id: Mutex<u64>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        InMemoryGateway::default()
    }

    pub fn seed_container(&self, center: &Center, ids: Vec<String>) {
        self.containers.lock().unwrap().insert(center.0.clone(), ids);
    }

    pub fn seed_entity(&self, entity: Entity) {
        self.entities.lock().unwrap().insert(entity.id.clone(), entity);
    }

    pub fn seed_table(&self, table: &TableHandle, frame: polars::prelude::DataFrame, locators: Vec<RowLocator>) {
        self.tables.lock().unwrap().insert(table.0.clone(), (frame, locators));
    }

    pub fn artifact(&self, name: &str) -> Option<Vec<u8>> {
        self.artifacts.lock().unwrap().get(name).cloned()
    }

    pub fn annotation(&self, target: &str, key: &str) -> Option<String> {
        self.annotations
            .lock()
            .unwrap()
            .get(&(target.to_string(), key.to_string()))
            .cloned()
    }

    pub fn table_height(&self, table: &TableHandle) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(&table.0)
            .map(|(frame, _)| frame.height())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Gateway for InMemoryGateway {
    async fn list_container(&self, center: &Center) -> PipelineResult<Vec<String>> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .get(&center.0)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_entity(&self, id: &str, _download: bool) -> PipelineResult<Entity> {
        self.entities
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| crate::error::PipelineError::PlatformFatal(format!("no such entity {id}")))
    }

    async fn query_table(&self, table: &TableHandle) -> PipelineResult<TableSnapshot> {
        let tables = self.tables.lock().unwrap();
        let (frame, locators) = tables
            .get(&table.0)
            .cloned()
            .unwrap_or_else(|| (polars::prelude::DataFrame::empty(), Vec::new()));
        Ok(TableSnapshot::new(frame, locators))
    }

    async fn apply_delta(&self, table: &TableHandle, delta: TableDelta) -> PipelineResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let (frame, locators) = tables
            .entry(table.0.clone())
            .or_insert_with(|| (polars::prelude::DataFrame::empty(), Vec::new()));

        let columns: Vec<String> = frame.get_column_names().into_iter().map(|s| s.to_string()).collect();
        let mut rows = crate::reconcile::extract_rows(frame);

        for locator in &delta.deletes {
            if let Some(pos) = locators.iter().position(|l| l == locator) {
                locators.remove(pos);
                rows.remove(pos);
            }
        }
        for (locator, row) in &delta.updates {
            if let Some(pos) = locators.iter().position(|l| l == locator) {
                rows[pos] = row.clone();
            }
        }
        let mut next_id = self.next_row_id.lock().unwrap();
        for row in &delta.appends {
            *next_id += 1;
            locators.push(RowLocator {
                row_id: next_id.to_string(),
                row_version: "0".to_string(),
            });
            rows.push(row.clone());
        }

        if !columns.is_empty() || !rows.is_empty() {
            *frame = rows_to_frame(&columns, &rows).map_err(crate::error::PipelineError::Polars)?;
        }
        Ok(())
    }

    async fn upload_artifact(&self, center: &Center, name: &str, bytes: &[u8]) -> PipelineResult<()> {
        let key = format!("{}/{}", center.0, name);
        self.artifacts.lock().unwrap().insert(key, bytes.to_vec());
        Ok(())
    }

    async fn ensure_table(&self, table: &TableHandle, columns: &[String]) -> PipelineResult<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.entry(table.0.clone()).or_insert_with(|| {
            let empty_rows: Vec<Vec<crate::reconcile::CellValue>> = Vec::new();
            let frame = rows_to_frame(columns, &empty_rows).unwrap_or_else(|_| polars::prelude::DataFrame::empty());
            (frame, Vec::new())
        });
        Ok(())
    }

    async fn ensure_container(&self, name: &str) -> PipelineResult<String> {
        let mut containers = self.containers.lock().unwrap();
        containers.entry(name.to_string()).or_default();
        Ok(name.to_string())
    }

    async fn set_annotation(&self, target: &str, key: &str, value: &str) -> PipelineResult<()> {
        self.annotations
            .lock()
            .unwrap()
            .insert((target.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn get_annotation(&self, target: &str, key: &str) -> PipelineResult<Option<String>> {
        Ok(self.annotation(target, key))
    }
}

/// Rebuild a `DataFrame` from owned rows, the inverse of
/// `reconcile::extract_rows`, used to fold an applied `TableDelta` back
/// into the in-memory store.
fn rows_to_frame(columns: &[String], rows: &[crate::reconcile::Row]) -> polars::prelude::PolarsResult<polars::prelude::DataFrame> {
    use polars::prelude::{Column, DataType, Series};

    let series: Vec<Column> = columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if rows.is_empty() {
                Ok(Series::new_empty(name.as_str().into(), &DataType::String).into())
            } else {
                let values: Vec<polars::prelude::AnyValue> = rows.iter().map(|row| row[idx].to_any()).collect();
                Series::from_any_values(name.as_str().into(), &values, false).map(Into::into)
            }
        })
        .collect::<polars::prelude::PolarsResult<Vec<_>>>()?;

    polars::prelude::DataFrame::new(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap as StdHashMap;

    #[tokio::test]
    async fn in_memory_gateway_round_trips_an_artifact() {
        let gateway = InMemoryGateway::new();
        let center = Center::from("CTR1");
        gateway
            .upload_artifact(&center, "run.jsonl", b"hello")
            .await
            .unwrap();
        assert_eq!(gateway.artifact("CTR1/run.jsonl"), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn in_memory_gateway_fetches_seeded_entity() {
        let gateway = InMemoryGateway::new();
        gateway.seed_entity(Entity {
            id: "syn1".into(),
            name: "a.csv".into(),
            md5: "m".into(),
            size: 1,
            created_by: "alice".into(),
            modified_by: "alice".into(),
            modified_on: Utc::now(),
            path: None,
            annotations: StdHashMap::new(),
        });
        let entity = gateway.fetch_entity("syn1", false).await.unwrap();
        assert_eq!(entity.name, "a.csv");
    }

    #[tokio::test]
    async fn ensure_table_is_idempotent_and_queryable_empty() {
        let gateway = InMemoryGateway::new();
        let table = TableHandle::from("status");
        gateway.ensure_table(&table, &["id".to_string(), "name".to_string()]).await.unwrap();
        gateway.ensure_table(&table, &["id".to_string(), "name".to_string()]).await.unwrap();
        let snapshot = gateway.query_table(&table).await.unwrap();
        assert_eq!(snapshot.frame.height(), 0);
        assert_eq!(snapshot.frame.get_column_names().len(), 2);
    }

    #[tokio::test]
    async fn apply_delta_round_trips_append_update_delete() {
        let gateway = InMemoryGateway::new();
        let table = TableHandle::from("status");
        gateway.ensure_table(&table, &["id".to_string(), "name".to_string()]).await.unwrap();

        gateway
            .apply_delta(
                &table,
                crate::reconcile::TableDelta {
                    appends: vec![
                        vec![crate::reconcile::CellValue::Str("a".into()), crate::reconcile::CellValue::Str("alice.csv".into())],
                        vec![crate::reconcile::CellValue::Str("b".into()), crate::reconcile::CellValue::Str("bob.csv".into())],
                    ],
                    updates: vec![],
                    deletes: vec![],
                },
            )
            .await
            .unwrap();
        assert_eq!(gateway.table_height(&table), 2);

        let snapshot = gateway.query_table(&table).await.unwrap();
        let first_locator = snapshot.row_locators[0].clone();

        gateway
            .apply_delta(
                &table,
                crate::reconcile::TableDelta {
                    appends: vec![],
                    updates: vec![(first_locator.clone(), vec![
                        crate::reconcile::CellValue::Str("a".into()),
                        crate::reconcile::CellValue::Str("renamed.csv".into()),
                    ])],
                    deletes: vec![],
                },
            )
            .await
            .unwrap();
        let snapshot = gateway.query_table(&table).await.unwrap();
        let name_col = snapshot.frame.column("name").unwrap().str().unwrap();
        assert!(name_col.into_iter().any(|v| v == Some("renamed.csv")));

        gateway
            .apply_delta(
                &table,
                crate::reconcile::TableDelta {
                    appends: vec![],
                    updates: vec![],
                    deletes: vec![first_locator],
                },
            )
            .await
            .unwrap();
        assert_eq!(gateway.table_height(&table), 1);
    }

    #[tokio::test]
    async fn set_annotation_is_readable_back() {
        let gateway = InMemoryGateway::new();
        gateway.set_annotation("syn999", "dbMapping", "{}").await.unwrap();
        assert_eq!(gateway.annotation("syn999", "dbMapping"), Some("{}".to_string()));
    }
}
