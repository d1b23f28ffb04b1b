//! In-memory row store
//!
//! Evaluates the same [`Request`](super::Request) model as the HTTP backend
//! against tables held in memory, and records every request it receives so
//! tests can count round trips.
#![cfg(any(test, feature = "testing"))]

use super::{Action, Backend, Filter, Order, Request, Row, RowStoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

type RpcHandler = Box<dyn Fn(&Value) -> Result<Vec<Row>, RowStoreError> + Send + Sync>;

#[derive(Default)]
struct Db {
    tables: HashMap<String, Vec<Row>>,
    failures: HashMap<String, RowStoreError>,
}

/// An in-memory database shared by every [`RowStore`](super::RowStore) built on it.
#[derive(Default)]
pub struct MemoryBackend {
    db: Mutex<Db>,
    rpcs: HashMap<String, RpcHandler>,
    log: Mutex<Vec<Request>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `table` with `rows`, each a JSON object.
    pub fn with_table(mut self, table: &str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.db.get_mut().tables.insert(table.to_string(), rows);
        self
    }

    /// Register a stored procedure.
    pub fn with_rpc<F>(mut self, function: &str, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<Vec<Row>, RowStoreError> + Send + Sync + 'static,
    {
        self.rpcs.insert(function.to_string(), Box::new(handler));
        self
    }

    /// Make every request against `target` fail with `error`.
    pub async fn fail(&self, target: &str, error: RowStoreError) {
        self.db.lock().await.failures.insert(target.to_string(), error);
    }

    /// Every request received so far, oldest first.
    pub async fn requests(&self) -> Vec<Request> {
        self.log.lock().await.clone()
    }

    /// Requests received so far against `target`.
    pub async fn requests_to(&self, target: &str) -> Vec<Request> {
        self.log
            .lock()
            .await
            .iter()
            .filter(|request| request.target == target)
            .cloned()
            .collect()
    }

    /// Current contents of `table`.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.db
            .lock()
            .await
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn execute(&self, request: Request) -> Result<Vec<Row>, RowStoreError> {
        self.log.lock().await.push(request.clone());

        let mut db = self.db.lock().await;
        if let Some(error) = db.failures.get(&request.target) {
            return Err(error.clone());
        }

        if let Action::Rpc { params } = &request.action {
            let handler = self.rpcs.get(&request.target).ok_or_else(|| RowStoreError::Status {
                status: 404,
                code: Some("PGRST202".to_string()),
                message: format!("Could not find the function {}", request.target),
            })?;
            return handler(params);
        }

        let table = db.tables.entry(request.target.clone()).or_default();
        match &request.action {
            Action::Select { columns } => {
                let mut rows: Vec<Row> = table
                    .iter()
                    .filter(|row| matches_all(row, &request.filters))
                    .cloned()
                    .collect();
                sort(&mut rows, &request.order);
                if let Some(limit) = request.limit {
                    rows.truncate(limit);
                }
                Ok(rows.into_iter().map(|row| project(row, columns)).collect())
            }
            Action::Insert(records) => {
                let now = chrono::Utc::now().to_rfc3339();
                let inserted: Vec<Row> = records
                    .iter()
                    .cloned()
                    .map(|mut row| {
                        row.entry("id")
                            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
                        row.entry("created_at")
                            .or_insert_with(|| Value::String(now.clone()));
                        row
                    })
                    .collect();
                table.extend(inserted.iter().cloned());
                Ok(inserted)
            }
            Action::Update(patch) => {
                let mut updated = Vec::new();
                for row in table.iter_mut() {
                    if matches_all(row, &request.filters) {
                        for (column, value) in patch {
                            row.insert(column.clone(), value.clone());
                        }
                        updated.push(row.clone());
                    }
                }
                Ok(updated)
            }
            Action::Delete => {
                let (removed, kept): (Vec<Row>, Vec<Row>) = table
                    .drain(..)
                    .partition(|row| matches_all(row, &request.filters));
                *table = kept;
                Ok(removed)
            }
            Action::Rpc { .. } => unreachable!("handled above"),
        }
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq { column, value } => row.get(column).unwrap_or(&Value::Null) == value,
        Filter::In { column, values } => row
            .get(column)
            .map(|cell| values.contains(cell))
            .unwrap_or(false),
    })
}

fn sort(rows: &mut [Row], order: &[Order]) {
    rows.sort_by(|a, b| {
        order
            .iter()
            .map(|o| {
                let ordering = compare(a.get(&o.column), b.get(&o.column));
                if o.desc {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn project(row: Row, columns: &str) -> Row {
    if columns.trim() == "*" {
        return row;
    }
    let wanted: Vec<&str> = columns.split(',').map(str::trim).collect();
    row.into_iter()
        .filter(|(column, _)| wanted.contains(&column.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row_store::RowStore;
    use serde_json::json;
    use std::sync::Arc;

    fn households() -> MemoryBackend {
        MemoryBackend::new().with_table(
            "expenses",
            vec![
                json!({ "id": "e1", "household_id": "h1", "amount": 30.0, "created_at": "2024-01-02" }),
                json!({ "id": "e2", "household_id": "h2", "amount": 10.0, "created_at": "2024-01-01" }),
                json!({ "id": "e3", "household_id": "h1", "amount": 20.0, "created_at": "2024-01-03" }),
            ],
        )
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_projects() {
        let store = RowStore::new(households());
        let rows = store
            .table("expenses")
            .select("id,amount")
            .eq("household_id", "h1")
            .order("created_at", true)
            .execute()
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!("e3"));
        assert_eq!(rows[1]["id"], json!("e1"));
        assert!(rows[0].get("household_id").is_none());
    }

    #[tokio::test]
    async fn test_in_set_and_limit() {
        let store = RowStore::new(households());
        let rows = store
            .table("expenses")
            .select("*")
            .in_set("id", ["e1", "e2", "nope"])
            .limit(1)
            .execute()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!("e1"));
    }

    #[tokio::test]
    async fn test_insert_update_delete() {
        let backend = Arc::new(households());
        let store = RowStore::from_backend(backend.clone());

        let mut record = Row::new();
        record.insert("household_id".to_string(), json!("h3"));
        let inserted = store.table("expenses").insert(record).execute().await.unwrap();
        assert!(inserted[0].contains_key("id"));
        assert!(inserted[0].contains_key("created_at"));

        let mut patch = Row::new();
        patch.insert("amount".to_string(), json!(99.0));
        let updated = store
            .table("expenses")
            .update(patch)
            .eq("household_id", "h1")
            .execute()
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);
        assert!(updated.iter().all(|row| row["amount"] == json!(99.0)));

        let removed = store
            .table("expenses")
            .delete()
            .eq("id", "e2")
            .execute()
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(backend.rows("expenses").await.len(), 3);
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let backend = Arc::new(households());
        backend
            .fail("expenses", RowStoreError::Transport("connection reset".to_string()))
            .await;
        let store = RowStore::from_backend(backend);

        let error = store.table("expenses").select("*").execute().await.unwrap_err();
        assert_eq!(error, RowStoreError::Transport("connection reset".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_rpc() {
        let store = RowStore::new(MemoryBackend::new());
        let error = store.rpc("missing", json!({})).execute().await.unwrap_err();
        assert!(matches!(error, RowStoreError::Status { status: 404, .. }));
    }
}
