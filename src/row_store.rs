//! Row store access
//!
//! A small filter-builder API over the hosted table service, shaped after the
//! PostgREST client libraries:
//!
//! ```rust,no_run
//! # async fn example(store: cohab_graphql::RowStore) -> Result<(), cohab_graphql::RowStoreError> {
//! let rows = store
//!     .table("expenses")
//!     .select("id,title")
//!     .eq("household_id", "h1")
//!     .order("created_at", true)
//!     .limit(20)
//!     .execute()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Every terminated query becomes a [`Request`] handed to a [`Backend`]. The
//! production backend speaks HTTP ([`postgrest::PostgrestBackend`]); tests use
//! the in-memory one.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod postgrest;

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryBackend;
pub use postgrest::{Postgrest, PostgrestBackend};

/// One record returned by the row store, in column order.
pub type Row = Map<String, Value>;

/// Errors reported by the row store
///
/// Cloneable so a single failed batch can be handed to every waiting key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowStoreError {
    #[error("row store request failed: {0}")]
    Transport(String),

    #[error("{message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("invalid row store response: {0}")]
    Decode(String),
}

/// A row filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
}

/// Result ordering on one column
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub desc: bool,
}

/// What a request does to its target
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Read rows, projecting `columns` (`*` or a comma list).
    Select { columns: String },
    Insert(Vec<Row>),
    Update(Row),
    Delete,
    /// Call a stored procedure; the target is the function name.
    Rpc { params: Value },
}

/// A fully built row store request
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub target: String,
    pub action: Action,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Request {
    fn new(target: impl Into<String>, action: Action) -> Self {
        Self {
            target: target.into(),
            action,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Short verb used in logs.
    pub fn verb(&self) -> &'static str {
        match self.action {
            Action::Select { .. } => "select",
            Action::Insert(_) => "insert",
            Action::Update(_) => "update",
            Action::Delete => "delete",
            Action::Rpc { .. } => "rpc",
        }
    }
}

/// Executes requests against a concrete row store
#[async_trait]
pub trait Backend: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Vec<Row>, RowStoreError>;
}

/// Row store access object
///
/// Bound to one caller's credentials; built per request and never shared
/// between requests.
#[derive(Clone)]
pub struct RowStore {
    backend: Arc<dyn Backend>,
}

impl RowStore {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_backend(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Start a request against `name`.
    pub fn table(&self, name: &str) -> Table {
        Table {
            backend: self.backend.clone(),
            name: name.to_string(),
        }
    }

    /// Call the stored procedure `function` with named `params`.
    pub fn rpc(&self, function: &str, params: Value) -> Query {
        Query {
            backend: self.backend.clone(),
            request: Request::new(function, Action::Rpc { params }),
        }
    }
}

impl fmt::Debug for RowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStore").finish_non_exhaustive()
    }
}

/// A table awaiting its action
pub struct Table {
    backend: Arc<dyn Backend>,
    name: String,
}

impl Table {
    /// Read `columns`, which is `*` or a comma separated column list.
    pub fn select(self, columns: impl ToString) -> Query {
        self.query(Action::Select {
            columns: columns.to_string(),
        })
    }

    pub fn insert(self, record: Row) -> Query {
        self.query(Action::Insert(vec![record]))
    }

    pub fn insert_many(self, records: Vec<Row>) -> Query {
        self.query(Action::Insert(records))
    }

    pub fn update(self, patch: Row) -> Query {
        self.query(Action::Update(patch))
    }

    pub fn delete(self) -> Query {
        self.query(Action::Delete)
    }

    fn query(self, action: Action) -> Query {
        Query {
            backend: self.backend,
            request: Request::new(self.name, action),
        }
    }
}

/// A request under construction
pub struct Query {
    backend: Arc<dyn Backend>,
    request: Request,
}

impl Query {
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.request.filters.push(Filter::Eq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Keep rows whose `column` is one of `values`.
    pub fn in_set<I, T>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.request.filters.push(Filter::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn order(mut self, column: &str, desc: bool) -> Self {
        self.request.order.push(Order {
            column: column.to_string(),
            desc,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.request.limit = Some(n);
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Send the request, returning rows in the order the store produced them.
    pub async fn execute(self) -> Result<Vec<Row>, RowStoreError> {
        tracing::debug!(
            target_name = %self.request.target,
            verb = self.request.verb(),
            filters = self.request.filters.len(),
            "row store request"
        );
        let target = self.request.target.clone();
        let result = self.backend.execute(self.request).await;
        if let Err(error) = &result {
            tracing::warn!(target_name = %target, %error, "row store request failed");
        }
        result
    }

    /// Send the request and keep only the first row.
    pub async fn execute_first(self) -> Result<Option<Row>, RowStoreError> {
        Ok(self.execute().await?.into_iter().next())
    }
}

/// Read `column` from `row` as a lookup key.
///
/// Strings are taken as-is and numbers are rendered in decimal; anything else
/// (including a missing column) has no key.
pub fn key_of(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
