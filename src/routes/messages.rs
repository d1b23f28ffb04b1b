//! Household chat

use super::{all, first, record, require_membership};
use crate::context::{request_context, require_user};
use crate::model::Message;
use crate::projection::columns_for;
use crate::types::json_column;
use async_graphql::{Context, InputObject, Object, Result};
use serde_json::{json, Value};

#[derive(InputObject)]
pub struct SendMessageInput {
    pub household_id: String,
    pub content: String,
    /// Defaults to `text`
    pub message_type: Option<String>,
    /// JSON text
    pub metadata: Option<String>,
}

#[derive(Default)]
pub struct MessageQueries;

#[Object]
impl MessageQueries {
    /// The latest `limit` messages of a household, oldest first
    async fn household_messages(
        &self,
        ctx: &Context<'_>,
        household_id: String,
        #[graphql(default = 50)] limit: i32,
    ) -> Result<Vec<Message>> {
        let rows = request_context(ctx)?
            .store
            .table("messages")
            .select(columns_for::<Message>(ctx))
            .eq("household_id", household_id)
            .order("created_at", true)
            .limit(super::limit(limit))
            .execute()
            .await?;

        let mut messages: Vec<Message> = all(rows)?;
        messages.reverse();
        Ok(messages)
    }
}

#[derive(Default)]
pub struct MessageMutations;

#[Object]
impl MessageMutations {
    /// Post a message to a household the caller belongs to
    async fn send_message(&self, ctx: &Context<'_>, input: SendMessageInput) -> Result<Option<Message>> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        require_membership(store, user_id, &input.household_id).await?;

        let message = record([
            ("household_id", json!(input.household_id)),
            ("sender_id", json!(user_id.to_string())),
            ("content", json!(input.content)),
            ("message_type", json!(input.message_type.as_deref().unwrap_or("text"))),
            (
                "metadata",
                input.metadata.as_deref().map(json_column).unwrap_or(Value::Null),
            ),
        ]);

        let rows = store.table("messages").insert(message).execute().await?;
        Ok(first(rows)?)
    }
}
