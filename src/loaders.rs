//! Request-scoped loader registry
//!
//! Every relationship traversal in the schema goes through one of these
//! loaders. All of them are the same [`TableLoader`]: one `in` query against a
//! grouping column, with results redistributed by key. The cardinality type
//! decides whether a key maps to a single row or to every matching row.

use crate::dataloaders::{BatchLoader, DataLoader};
use crate::row_store::{key_of, Row, RowStore, RowStoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;

/// How rows sharing a key are folded into one loader value
pub trait Cardinality: Clone + Default + Send + Sync + 'static {
    fn collect(rows: Vec<Row>, column: &str) -> HashMap<String, Self>;
}

/// One-to-one: the row whose key column matches, or `None`.
impl Cardinality for Option<Row> {
    fn collect(rows: Vec<Row>, column: &str) -> HashMap<String, Self> {
        rows.into_iter()
            .filter_map(|row| key_of(&row, column).map(|key| (key, Some(row))))
            .collect()
    }
}

/// One-to-many: every matching row in store order; no match is an empty list.
impl Cardinality for Vec<Row> {
    fn collect(rows: Vec<Row>, column: &str) -> HashMap<String, Self> {
        let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
        for row in rows {
            if let Some(key) = key_of(&row, column) {
                groups.entry(key).or_default().push(row);
            }
        }
        groups
    }
}

/// Batch function fetching `table` rows whose `column` is in the key set
pub struct TableLoader<C> {
    store: RowStore,
    table: &'static str,
    column: &'static str,
    _cardinality: PhantomData<fn() -> C>,
}

impl<C> TableLoader<C> {
    pub fn new(store: RowStore, table: &'static str, column: &'static str) -> Self {
        Self {
            store,
            table,
            column,
            _cardinality: PhantomData,
        }
    }
}

#[async_trait]
impl<C: Cardinality> BatchLoader<String, C> for TableLoader<C> {
    type Error = RowStoreError;

    async fn load_batch(&self, keys: &[String]) -> Result<HashMap<String, C>, RowStoreError> {
        tracing::debug!(
            table = self.table,
            column = self.column,
            keys = keys.len(),
            "loader batch"
        );
        let rows = self
            .store
            .table(self.table)
            .select("*")
            .in_set(self.column, keys.iter().cloned())
            .execute()
            .await?;
        Ok(C::collect(rows, self.column))
    }
}

/// Loader yielding at most one row per key
pub type OneLoader = DataLoader<String, Option<Row>, TableLoader<Option<Row>>>;

/// Loader yielding every row sharing a key
pub type ManyLoader = DataLoader<String, Vec<Row>, TableLoader<Vec<Row>>>;

fn one(store: &RowStore, table: &'static str, column: &'static str, delay: Duration) -> OneLoader {
    DataLoader::new(TableLoader::new(store.clone(), table, column)).with_delay(delay)
}

fn many(store: &RowStore, table: &'static str, column: &'static str, delay: Duration) -> ManyLoader {
    DataLoader::new(TableLoader::new(store.clone(), table, column)).with_delay(delay)
}

/// Every loader available to resolvers during one request
///
/// Built fresh per request around that request's row store; nothing here
/// outlives the request.
#[derive(Clone)]
pub struct Loaders {
    pub profile: OneLoader,
    pub household: OneLoader,
    pub roommates_by_household: ManyLoader,
    pub roommates_by_user: ManyLoader,
    pub expense: OneLoader,
    pub expenses_by_household: ManyLoader,
    pub expense_splits_by_expense: ManyLoader,
    pub expense_splits_by_user: ManyLoader,
    pub messages_by_household: ManyLoader,
    pub messages_by_sender: ManyLoader,
    pub notifications_by_user: ManyLoader,
    pub chore: OneLoader,
}

impl Loaders {
    pub fn new(store: &RowStore, delay: Duration) -> Self {
        Self {
            profile: one(store, "profiles", "id", delay),
            household: one(store, "households", "id", delay),
            roommates_by_household: many(store, "roommates", "household_id", delay),
            roommates_by_user: many(store, "roommates", "user_id", delay),
            expense: one(store, "expenses", "id", delay),
            expenses_by_household: many(store, "expenses", "household_id", delay),
            expense_splits_by_expense: many(store, "expense_splits", "expense_id", delay),
            expense_splits_by_user: many(store, "expense_splits", "user_id", delay),
            messages_by_household: many(store, "messages", "household_id", delay),
            messages_by_sender: many(store, "messages", "sender_id", delay),
            notifications_by_user: many(store, "notifications", "user_id", delay),
            chore: one(store, "chores", "id", delay),
        }
    }

    /// Drop cached memberships after a join or leave, so later fields in the
    /// same request see the new roommate rows.
    pub async fn forget_memberships(&self) {
        self.roommates_by_household.clear().await;
        self.roommates_by_user.clear().await;
    }
}
