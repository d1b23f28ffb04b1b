//! Field selection trees
//!
//! The part of a query a resolver has to satisfy, lifted out of async-graphql's
//! parsed document so projection can be computed (and tested) without a
//! running executor. Fragments and inline fragments are already flattened by
//! the time a selection reaches us.

use async_graphql::{Context, SelectionField};

/// One requested field and the fields requested beneath it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    /// Wire (camel case) field name, never the alias.
    pub name: String,
    pub children: Vec<Selection>,
}

impl Selection {
    /// The selection of the field currently being resolved.
    pub fn from_context(ctx: &Context<'_>) -> Self {
        Self::from_field(ctx.field())
    }

    pub fn from_field(field: SelectionField<'_>) -> Self {
        Self {
            name: field.name().to_string(),
            children: field
                .selection_set()
                .filter(|child| !child.name().starts_with("__"))
                .map(Self::from_field)
                .collect(),
        }
    }

    pub fn leaf(name: &str) -> Self {
        Self {
            name: name.to_string(),
            children: Vec::new(),
        }
    }

    pub fn node(name: &str, children: Vec<Selection>) -> Self {
        Self {
            name: name.to_string(),
            children,
        }
    }

    /// First child named `name`.
    pub fn child(&self, name: &str) -> Option<&Selection> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::{EmptyMutation, EmptySubscription, Object, Schema, SimpleObject};
    use std::sync::{Arc, Mutex};

    #[derive(SimpleObject, Default)]
    struct Inner {
        id: i32,
        title: String,
    }

    #[derive(Default)]
    struct Query {
        seen: Arc<Mutex<Option<Selection>>>,
    }

    #[Object]
    impl Query {
        async fn item(&self, ctx: &Context<'_>) -> Inner {
            *self.seen.lock().unwrap() = Some(Selection::from_context(ctx));
            Inner::default()
        }
    }

    #[tokio::test]
    async fn test_from_context_flattens_fragments() {
        let seen = Arc::new(Mutex::new(None));
        let schema = Schema::new(
            Query { seen: seen.clone() },
            EmptyMutation,
            EmptySubscription,
        );

        let response = schema
            .execute(
                "{ item { renamed: title __typename ...F } } fragment F on Inner { id }",
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);

        let selection = seen.lock().unwrap().clone().unwrap();
        assert_eq!(
            selection,
            Selection::node("item", vec![Selection::leaf("title"), Selection::leaf("id")])
        );
        assert!(selection.child("id").is_some());
        assert!(selection.child("renamed").is_none());
    }
}
