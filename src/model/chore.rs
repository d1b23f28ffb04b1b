use super::{decode, Household, Profile};
use crate::context::request_context;
use crate::descriptor::{Described, Descriptor, FieldDecl, FieldType};
use crate::types::DateTime;
use async_graphql::{ComplexObject, Context, Result, SimpleObject, ID};
use serde::Deserialize;

/// Recurring chore template
#[derive(SimpleObject, Deserialize, Default, Clone, Debug)]
#[graphql(complex)]
#[serde(default)]
pub struct Chore {
    pub id: Option<ID>,
    pub household_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// `daily`, `weekly`, `monthly` or `none`
    pub recurrence: Option<String>,
    pub points: Option<i32>,
    pub requires_proof: Option<bool>,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

static CHORE: Descriptor = Descriptor {
    name: "Chore",
    table: "chores",
    fields: &[
        FieldDecl::stored("id", FieldType::Id),
        FieldDecl::stored("household_id", FieldType::String),
        FieldDecl::stored("title", FieldType::String),
        FieldDecl::stored("description", FieldType::String),
        FieldDecl::stored("recurrence", FieldType::String),
        FieldDecl::stored("points", FieldType::Int),
        FieldDecl::stored("requires_proof", FieldType::Boolean),
        FieldDecl::stored("created_by", FieldType::String),
        FieldDecl::stored("created_at", FieldType::Timestamp),
        FieldDecl::stored("updated_at", FieldType::Timestamp),
        FieldDecl::computed("household", FieldType::Object("Household")),
    ],
};

impl Described for Chore {
    fn descriptor() -> &'static Descriptor {
        &CHORE
    }
}

#[ComplexObject]
impl Chore {
    async fn household(&self, ctx: &Context<'_>) -> Result<Option<Household>> {
        let Some(household_id) = self.household_id.clone() else {
            return Ok(None);
        };
        let row = request_context(ctx)?
            .loaders
            .household
            .load(household_id)
            .await?;
        Ok(row.map(decode).transpose()?)
    }
}

/// A chore handed to one roommate
#[derive(SimpleObject, Deserialize, Default, Clone, Debug)]
#[graphql(complex)]
#[serde(default)]
pub struct ChoreAssignment {
    pub id: Option<ID>,
    pub chore_id: Option<String>,
    pub user_id: Option<String>,
    pub due_date: Option<DateTime>,
    pub is_complete: Option<bool>,
    pub completed_at: Option<DateTime>,
    pub proof_url: Option<String>,
    pub created_at: Option<DateTime>,
}

static CHORE_ASSIGNMENT: Descriptor = Descriptor {
    name: "ChoreAssignment",
    table: "chore_assignments",
    fields: &[
        FieldDecl::stored("id", FieldType::Id),
        FieldDecl::stored("chore_id", FieldType::String),
        FieldDecl::stored("user_id", FieldType::String),
        FieldDecl::stored("due_date", FieldType::Timestamp),
        FieldDecl::stored("is_complete", FieldType::Boolean),
        FieldDecl::stored("completed_at", FieldType::Timestamp),
        FieldDecl::stored("proof_url", FieldType::String),
        FieldDecl::stored("created_at", FieldType::Timestamp),
        FieldDecl::computed("chore", FieldType::Object("Chore")),
        FieldDecl::computed("user", FieldType::Object("Profile")),
    ],
};

impl Described for ChoreAssignment {
    fn descriptor() -> &'static Descriptor {
        &CHORE_ASSIGNMENT
    }
}

#[ComplexObject]
impl ChoreAssignment {
    async fn chore(&self, ctx: &Context<'_>) -> Result<Option<Chore>> {
        let Some(chore_id) = self.chore_id.clone() else {
            return Ok(None);
        };
        let row = request_context(ctx)?.loaders.chore.load(chore_id).await?;
        Ok(row.map(decode).transpose()?)
    }

    /// The assignee
    async fn user(&self, ctx: &Context<'_>) -> Result<Option<Profile>> {
        let Some(user_id) = self.user_id.clone() else {
            return Ok(None);
        };
        let row = request_context(ctx)?.loaders.profile.load(user_id).await?;
        Ok(row.map(decode).transpose()?)
    }
}
