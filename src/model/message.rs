use super::{decode, Household, Profile};
use crate::context::request_context;
use crate::descriptor::{Described, Descriptor, FieldDecl, FieldType};
use crate::types::{json_text, reparse_json, DateTime};
use async_graphql::{ComplexObject, Context, Result, SimpleObject, ID};
use serde::Deserialize;

/// Household chat message
#[derive(SimpleObject, Deserialize, Default, Clone, Debug)]
#[graphql(complex)]
#[serde(default)]
pub struct Message {
    pub id: Option<ID>,
    pub household_id: Option<String>,
    pub sender_id: Option<String>,
    pub content: Option<String>,
    pub message_type: Option<String>,
    #[serde(deserialize_with = "json_text")]
    pub metadata: Option<String>,
    pub created_at: Option<DateTime>,
}

static MESSAGE: Descriptor = Descriptor {
    name: "Message",
    table: "messages",
    fields: &[
        FieldDecl::stored("id", FieldType::Id),
        FieldDecl::stored("household_id", FieldType::String),
        FieldDecl::stored("sender_id", FieldType::String),
        FieldDecl::stored("content", FieldType::String),
        FieldDecl::stored("message_type", FieldType::String),
        FieldDecl::stored("metadata", FieldType::String),
        FieldDecl::stored("created_at", FieldType::Timestamp),
        FieldDecl::computed("parsed_metadata", FieldType::String),
        FieldDecl::computed("sender", FieldType::Object("Profile")),
        FieldDecl::computed("household", FieldType::Object("Household")),
    ],
};

impl Described for Message {
    fn descriptor() -> &'static Descriptor {
        &MESSAGE
    }
}

#[ComplexObject]
impl Message {
    /// `metadata` re-serialized as compact JSON, or verbatim when it isn't JSON
    async fn parsed_metadata(&self) -> Option<String> {
        reparse_json(self.metadata.as_deref())
    }

    async fn sender(&self, ctx: &Context<'_>) -> Result<Option<Profile>> {
        let Some(sender_id) = self.sender_id.clone() else {
            return Ok(None);
        };
        let row = request_context(ctx)?.loaders.profile.load(sender_id).await?;
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
