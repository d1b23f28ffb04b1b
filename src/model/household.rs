use super::{decode_all, decode_present, key, Expense, Message, Profile, Roommate, ACCEPTED};
use crate::context::request_context;
use crate::descriptor::{Described, Descriptor, FieldDecl, FieldType};
use crate::row_store::key_of;
use crate::types::DateTime;
use async_graphql::{ComplexObject, Context, Result, SimpleObject, ID};
use serde::Deserialize;

/// A shared home and its roommates
#[derive(SimpleObject, Deserialize, Default, Clone, Debug)]
#[graphql(complex)]
#[serde(default)]
pub struct Household {
    pub id: Option<ID>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub rent_amount: Option<f64>,
    pub currency: Option<String>,
    pub household_type: Option<String>,
    pub amenities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub is_available: Option<bool>,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
    pub invite_code: Option<String>,
}

static HOUSEHOLD: Descriptor = Descriptor {
    name: "Household",
    table: "households",
    fields: &[
        FieldDecl::stored("id", FieldType::Id),
        FieldDecl::stored("name", FieldType::String),
        FieldDecl::stored("description", FieldType::String),
        FieldDecl::stored("address", FieldType::String),
        FieldDecl::stored("rent_amount", FieldType::Float),
        FieldDecl::stored("currency", FieldType::String),
        FieldDecl::stored("household_type", FieldType::String),
        FieldDecl::stored("amenities", FieldType::StringList),
        FieldDecl::stored("images", FieldType::StringList),
        FieldDecl::stored("is_available", FieldType::Boolean),
        FieldDecl::stored("created_by", FieldType::String),
        FieldDecl::stored("created_at", FieldType::Timestamp),
        FieldDecl::stored("updated_at", FieldType::Timestamp),
        FieldDecl::stored("invite_code", FieldType::String),
        FieldDecl::computed("roommates", FieldType::ObjectList("Profile")),
        FieldDecl::computed("members", FieldType::ObjectList("Roommate")),
        FieldDecl::computed("expenses", FieldType::ObjectList("Expense")),
        FieldDecl::computed("messages", FieldType::ObjectList("Message")),
    ],
};

impl Described for Household {
    fn descriptor() -> &'static Descriptor {
        &HOUSEHOLD
    }
}

#[ComplexObject]
impl Household {
    /// Profiles of every accepted roommate
    async fn roommates(&self, ctx: &Context<'_>) -> Result<Option<Vec<Profile>>> {
        let Some(id) = key(&self.id) else {
            return Ok(Some(Vec::new()));
        };
        let loaders = &request_context(ctx)?.loaders;

        let user_ids: Vec<String> = loaders
            .roommates_by_household
            .load(id)
            .await?
            .iter()
            .filter(|row| key_of(row, "status").as_deref() == Some(ACCEPTED))
            .filter_map(|row| key_of(row, "user_id"))
            .collect();

        let rows = loaders.profile.load_many(user_ids).await?;
        Ok(Some(decode_present(rows)?))
    }

    /// Every membership row, including roommates who left
    async fn members(&self, ctx: &Context<'_>) -> Result<Option<Vec<Roommate>>> {
        let Some(id) = key(&self.id) else {
            return Ok(Some(Vec::new()));
        };
        let rows = request_context(ctx)?
            .loaders
            .roommates_by_household
            .load(id)
            .await?;
        Ok(Some(decode_all(rows)?))
    }

    async fn expenses(&self, ctx: &Context<'_>) -> Result<Option<Vec<Expense>>> {
        let Some(id) = key(&self.id) else {
            return Ok(Some(Vec::new()));
        };
        let rows = request_context(ctx)?
            .loaders
            .expenses_by_household
            .load(id)
            .await?;
        Ok(Some(decode_all(rows)?))
    }

    async fn messages(&self, ctx: &Context<'_>) -> Result<Option<Vec<Message>>> {
        let Some(id) = key(&self.id) else {
            return Ok(Some(Vec::new()));
        };
        let rows = request_context(ctx)?
            .loaders
            .messages_by_household
            .load(id)
            .await?;
        Ok(Some(decode_all(rows)?))
    }
}
