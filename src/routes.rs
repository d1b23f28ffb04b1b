//! Domain queries and mutations
//!
//! One query object and one mutation object per domain, composed into the
//! root types by [`crate::schema`]. Top-level fields query the row store
//! directly with a projected column list; nested relationships are left to the
//! loaders on the model types.

use crate::model::ACCEPTED;
use crate::row_store::{Row, RowStore};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

pub mod chores;
pub mod expenses;
pub mod households;
pub mod messages;
pub mod notifications;
pub mod profiles;

pub use chores::{ChoreMutations, ChoreQueries};
pub use expenses::{ExpenseMutations, ExpenseQueries};
pub use households::{HouseholdMutations, HouseholdQueries};
pub use messages::{MessageMutations, MessageQueries};
pub use notifications::{NotificationMutations, NotificationQueries};
pub use profiles::{ProfileMutations, ProfileQueries};

/// Fail unless `user_id` is an accepted member of `household_id`.
pub async fn require_membership(store: &RowStore, user_id: Uuid, household_id: &str) -> Result<()> {
    let membership = store
        .table("roommates")
        .select("id")
        .eq("user_id", user_id.to_string())
        .eq("household_id", household_id)
        .eq("status", ACCEPTED)
        .execute_first()
        .await?;

    match membership {
        Some(_) => Ok(()),
        None => Err(Error::NotAuthorized(
            "Not a member of this household".to_string(),
        )),
    }
}

/// Decode the first row, if any.
pub(crate) fn first<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Option<T>> {
    Ok(rows
        .into_iter()
        .next()
        .map(crate::model::decode)
        .transpose()?)
}

pub(crate) fn all<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    Ok(crate::model::decode_all(rows)?)
}

/// Negative limits clamp to zero.
pub(crate) fn limit(n: i32) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// Partial update built from optional input fields
#[derive(Debug, Default)]
pub struct Patch {
    row: Row,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` when `value` was provided.
    pub fn set<T: Into<Value>>(mut self, column: &str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.row.insert(column.to_string(), value.into());
        }
        self
    }

    pub fn into_row(self) -> Result<Row> {
        if self.row.is_empty() {
            return Err(Error::InvalidInput("No fields to update".to_string()));
        }
        Ok(self.row)
    }
}

/// Row from `(column, value)` pairs.
pub(crate) fn record<const N: usize>(pairs: [(&str, Value); N]) -> Row {
    pairs
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}
