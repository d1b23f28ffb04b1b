use super::{decode, Household, Profile};
use crate::context::request_context;
use crate::descriptor::{Described, Descriptor, FieldDecl, FieldType};
use crate::types::DateTime;
use async_graphql::{ComplexObject, Context, Result, SimpleObject, ID};
use serde::Deserialize;

/// Membership status of a current roommate.
pub const ACCEPTED: &str = "accepted";
/// Membership status after leaving.
pub const LEFT: &str = "left";

/// A user's membership in a household
#[derive(SimpleObject, Deserialize, Default, Clone, Debug)]
#[graphql(complex)]
#[serde(default)]
pub struct Roommate {
    pub id: Option<ID>,
    pub user_id: Option<String>,
    pub household_id: Option<String>,
    /// `accepted` or `left`
    pub status: Option<String>,
    pub joined_at: Option<DateTime>,
    pub left_at: Option<DateTime>,
}

static ROOMMATE: Descriptor = Descriptor {
    name: "Roommate",
    table: "roommates",
    fields: &[
        FieldDecl::stored("id", FieldType::Id),
        FieldDecl::stored("user_id", FieldType::String),
        FieldDecl::stored("household_id", FieldType::String),
        FieldDecl::stored("status", FieldType::String),
        FieldDecl::stored("joined_at", FieldType::Timestamp),
        FieldDecl::stored("left_at", FieldType::Timestamp),
        FieldDecl::computed("profile", FieldType::Object("Profile")),
        FieldDecl::computed("household", FieldType::Object("Household")),
    ],
};

impl Described for Roommate {
    fn descriptor() -> &'static Descriptor {
        &ROOMMATE
    }
}

#[ComplexObject]
impl Roommate {
    async fn profile(&self, ctx: &Context<'_>) -> Result<Option<Profile>> {
        let Some(user_id) = self.user_id.clone() else {
            return Ok(None);
        };
        let row = request_context(ctx)?.loaders.profile.load(user_id).await?;
        Ok(row.map(decode).transpose()?)
    }

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
