//! Root schema
//!
//! The root `Query` and `Mutation` types expose one field per domain; each
//! returns that domain's query or mutation object.

use crate::routes::{
    ChoreMutations, ChoreQueries, ExpenseMutations, ExpenseQueries, HouseholdMutations,
    HouseholdQueries, MessageMutations, MessageQueries, NotificationMutations,
    NotificationQueries, ProfileMutations, ProfileQueries,
};
use async_graphql::{EmptySubscription, Object, Schema};

/// Deepest selection accepted from a client.
pub const MAX_DEPTH: usize = 15;

pub type AppSchema = Schema<Query, Mutation, EmptySubscription>;

#[derive(Default)]
pub struct Query;

#[Object]
impl Query {
    /// Household queries
    async fn households(&self) -> HouseholdQueries {
        HouseholdQueries
    }

    async fn profiles(&self) -> ProfileQueries {
        ProfileQueries
    }

    async fn expenses(&self) -> ExpenseQueries {
        ExpenseQueries
    }

    async fn messages(&self) -> MessageQueries {
        MessageQueries
    }

    async fn notifications(&self) -> NotificationQueries {
        NotificationQueries
    }

    async fn chores(&self) -> ChoreQueries {
        ChoreQueries
    }
}

#[derive(Default)]
pub struct Mutation;

#[Object]
impl Mutation {
    /// Household mutations
    async fn households(&self) -> HouseholdMutations {
        HouseholdMutations
    }

    async fn profiles(&self) -> ProfileMutations {
        ProfileMutations
    }

    async fn expenses(&self) -> ExpenseMutations {
        ExpenseMutations
    }

    async fn messages(&self) -> MessageMutations {
        MessageMutations
    }

    async fn notifications(&self) -> NotificationMutations {
        NotificationMutations
    }

    async fn chores(&self) -> ChoreMutations {
        ChoreMutations
    }
}

/// Build the schema. Request data ([`crate::RequestContext`]) is attached per
/// request, never at build time.
pub fn build_schema() -> AppSchema {
    Schema::build(Query, Mutation, EmptySubscription)
        .limit_depth(MAX_DEPTH)
        .finish()
}
