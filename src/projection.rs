//! Column projection
//!
//! Turns a [`Selection`] into the narrowest `select=` list that still lets
//! every requested field resolve:
//!
//! - stored fields anywhere in the tree are selected by column name
//! - `id` is always selected when the type has one
//! - a requested `profile` pulls in `user_id`
//! - any other computed field `foo` pulls in `foo_id` when that column exists
//!
//! A missing or empty selection, or one that ends up naming every column,
//! selects `*`.

use crate::descriptor::{shape, Described, Descriptor, Shape};
use crate::selection::Selection;
use async_graphql::Context;
use std::collections::BTreeSet;
use std::fmt;

/// Columns to request from the row store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    /// Sorted storage names.
    Columns(Vec<String>),
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::All => f.write_str("*"),
            Projection::Columns(columns) => f.write_str(&columns.join(",")),
        }
    }
}

#[derive(Default)]
struct Requested {
    stored: BTreeSet<&'static str>,
    computed: BTreeSet<String>,
}

fn collect(shape: &Shape, selections: &[Selection], into: &mut Requested) {
    for selection in selections {
        match shape.column(&selection.name) {
            Some(column) => {
                into.stored.insert(column);
            }
            None => {
                into.computed.insert(selection.name.clone());
            }
        }
        collect(shape, &selection.children, into);
    }
}

fn finish(shape: &Shape, columns: BTreeSet<&'static str>) -> Projection {
    if columns.is_empty() || columns.len() == shape.partition.stored.len() {
        return Projection::All;
    }
    Projection::Columns(columns.into_iter().map(str::to_string).collect())
}

/// Project `selection`, the field resolving to `descriptor`'s type.
pub fn project(descriptor: &'static Descriptor, selection: Option<&Selection>) -> Projection {
    let selection = match selection {
        Some(selection) if !selection.is_empty() => selection,
        _ => return Projection::All,
    };
    let shape = shape(descriptor);

    let mut requested = Requested::default();
    collect(&shape, &selection.children, &mut requested);

    let mut columns = requested.stored;
    if shape.is_stored("id") {
        columns.insert("id");
    }
    if requested.computed.contains("profile") && shape.is_stored("user_id") {
        columns.insert("user_id");
    }
    for field in &requested.computed {
        if let Some(foreign_key) = shape.column(&format!("{}Id", field)) {
            columns.insert(foreign_key);
        }
    }

    finish(&shape, columns)
}

/// Projection for `T` from the field currently being resolved.
pub fn columns_for<T: Described>(ctx: &Context<'_>) -> Projection {
    project(T::descriptor(), Some(&Selection::from_context(ctx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDecl, FieldType};
    use crate::model::{Expense, Roommate};

    fn leaves(names: &[&str]) -> Vec<Selection> {
        names.iter().map(|name| Selection::leaf(name)).collect()
    }

    fn field(children: Vec<Selection>) -> Selection {
        Selection::node("result", children)
    }

    #[test]
    fn test_expense_title_and_amount() {
        let selection = field(leaves(&["title", "amount"]));
        let projection = project(Expense::descriptor(), Some(&selection));
        assert_eq!(projection.to_string(), "amount,id,title");
    }

    #[test]
    fn test_missing_or_empty_selection_selects_all() {
        assert_eq!(project(Expense::descriptor(), None), Projection::All);
        assert_eq!(
            project(Expense::descriptor(), Some(&field(Vec::new()))),
            Projection::All
        );
        assert_eq!(Projection::All.to_string(), "*");
    }

    #[test]
    fn test_every_column_selects_all() {
        let selection = field(leaves(&[
            "id",
            "householdId",
            "title",
            "description",
            "amount",
            "currency",
            "category",
            "paidBy",
            "createdAt",
            "dueDate",
        ]));
        assert_eq!(project(Expense::descriptor(), Some(&selection)), Projection::All);
    }

    #[test]
    fn test_storage_names_are_accepted() {
        let selection = field(leaves(&["paid_by", "dueDate"]));
        assert_eq!(
            project(Expense::descriptor(), Some(&selection)).to_string(),
            "due_date,id,paid_by"
        );
    }

    #[test]
    fn test_singular_relationship_pulls_foreign_key() {
        let selection = field(vec![
            Selection::leaf("title"),
            Selection::node("household", leaves(&["name"])),
        ]);
        assert_eq!(
            project(Expense::descriptor(), Some(&selection)).to_string(),
            "household_id,id,title"
        );
    }

    #[test]
    fn test_has_many_relationship_adds_nothing() {
        let selection = field(vec![
            Selection::leaf("title"),
            Selection::node("splits", leaves(&["isPaid"])),
        ]);
        assert_eq!(
            project(Expense::descriptor(), Some(&selection)).to_string(),
            "id,title"
        );
    }

    #[test]
    fn test_profile_pulls_user_id() {
        let selection = field(vec![
            Selection::leaf("status"),
            Selection::node("profile", leaves(&["fullName"])),
        ]);
        assert_eq!(
            project(Roommate::descriptor(), Some(&selection)).to_string(),
            "id,status,user_id"
        );
    }

    #[test]
    fn test_nested_selections_contribute_columns() {
        // `amount` only appears beneath a relationship but is still a column here.
        let selection = field(vec![Selection::node("splits", leaves(&["amount"]))]);
        assert_eq!(
            project(Expense::descriptor(), Some(&selection)).to_string(),
            "amount,id"
        );
    }

    #[test]
    fn test_without_id_column() {
        static EVENT: Descriptor = Descriptor {
            name: "TestEvent",
            table: "events",
            fields: &[
                FieldDecl::stored("kind", FieldType::String),
                FieldDecl::stored("at", FieldType::Timestamp),
                FieldDecl::computed("summary", FieldType::String),
            ],
        };

        let only_computed = field(leaves(&["summary"]));
        assert_eq!(project(&EVENT, Some(&only_computed)), Projection::All);

        let kind = field(leaves(&["kind"]));
        assert_eq!(project(&EVENT, Some(&kind)).to_string(), "kind");
    }

    #[test]
    fn test_colliding_wire_name_resolves_to_first_declared() {
        static LEGACY: Descriptor = Descriptor {
            name: "TestLegacy",
            table: "legacy",
            fields: &[
                FieldDecl::stored("id", FieldType::Id),
                FieldDecl::stored("owner_id", FieldType::String),
                FieldDecl::stored("owner__id", FieldType::String),
                FieldDecl::stored("note", FieldType::String),
            ],
        };

        let selection = field(leaves(&["ownerId"]));
        assert_eq!(project(&LEGACY, Some(&selection)).to_string(), "id,owner_id");

        let by_storage = field(leaves(&["owner__id"]));
        assert_eq!(project(&LEGACY, Some(&by_storage)).to_string(), "id,owner__id");
    }
}
