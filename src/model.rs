//! GraphQL object types
//!
//! Each type mirrors one row store table. Every column is optional because a
//! projected query only returns the columns the client asked for. Relationship
//! fields resolve through the request's [`Loaders`](crate::Loaders).

use crate::row_store::{Row, RowStoreError};
use async_graphql::ID;
use serde::de::DeserializeOwned;

mod chore;
mod expense;
mod household;
mod message;
mod notification;
mod profile;
mod roommate;

pub use chore::{Chore, ChoreAssignment};
pub use expense::{Expense, ExpenseSplit};
pub use household::Household;
pub use message::Message;
pub use notification::Notification;
pub use profile::Profile;
pub use roommate::{Roommate, ACCEPTED, LEFT};

/// Build a GraphQL object from a row.
pub fn decode<T: DeserializeOwned>(row: Row) -> Result<T, RowStoreError> {
    serde_json::from_value(serde_json::Value::Object(row))
        .map_err(|e| RowStoreError::Decode(e.to_string()))
}

pub fn decode_all<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, RowStoreError> {
    rows.into_iter().map(decode).collect()
}

/// Decode the rows a one-to-one loader returned, skipping absent keys.
pub(crate) fn decode_present<T: DeserializeOwned>(
    rows: Vec<Option<Row>>,
) -> Result<Vec<T>, RowStoreError> {
    rows.into_iter().flatten().map(decode).collect()
}

pub(crate) fn key(id: &Option<ID>) -> Option<String> {
    id.as_ref().map(|id| id.to_string())
}
