//! Notification inbox

use super::{all, record};
use crate::context::{get_user_id, request_context, require_user};
use crate::model::Notification;
use crate::projection::columns_for;
use crate::row_store::key_of;
use crate::Error;
use async_graphql::{Context, InputObject, Object, Result};
use serde_json::json;

#[derive(InputObject)]
pub struct MarkNotificationReadInput {
    pub notification_id: String,
}

#[derive(Default)]
pub struct NotificationQueries;

#[Object]
impl NotificationQueries {
    /// The caller's notifications, newest first; empty when anonymous
    async fn my_notifications(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = false)] unread_only: bool,
        #[graphql(default = 20)] limit: i32,
    ) -> Result<Vec<Notification>> {
        let Some(user_id) = get_user_id(ctx) else {
            return Ok(Vec::new());
        };

        let mut query = request_context(ctx)?
            .store
            .table("notifications")
            .select(columns_for::<Notification>(ctx))
            .eq("user_id", user_id.to_string());
        if unread_only {
            query = query.eq("is_read", false);
        }
        let rows = query
            .order("created_at", true)
            .limit(super::limit(limit))
            .execute()
            .await?;
        Ok(all(rows)?)
    }
}

#[derive(Default)]
pub struct NotificationMutations;

#[Object]
impl NotificationMutations {
    /// Mark one of the caller's notifications as read
    async fn mark_notification_read(
        &self,
        ctx: &Context<'_>,
        input: MarkNotificationReadInput,
    ) -> Result<bool> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;

        let owner = store
            .table("notifications")
            .select("user_id")
            .eq("id", input.notification_id.as_str())
            .execute_first()
            .await?
            .ok_or_else(|| Error::NotFound("Notification not found".to_string()))?;
        if key_of(&owner, "user_id").as_deref() != Some(user_id.to_string().as_str()) {
            return Err(Error::NotAuthorized("Not authorized".to_string()).into());
        }

        store
            .table("notifications")
            .update(record([("is_read", json!(true))]))
            .eq("id", input.notification_id)
            .execute()
            .await?;
        Ok(true)
    }

    /// Mark every unread notification of the caller as read
    async fn mark_all_notifications_read(&self, ctx: &Context<'_>) -> Result<bool> {
        let user_id = require_user(ctx)?;
        request_context(ctx)?
            .store
            .table("notifications")
            .update(record([("is_read", json!(true))]))
            .eq("user_id", user_id.to_string())
            .eq("is_read", false)
            .execute()
            .await?;
        Ok(true)
    }
}
