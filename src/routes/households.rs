//! Household queries and mutations
//!
//! Membership lives in `roommates`: a row per (user, household) whose status is
//! `accepted` while the user belongs and `left` afterwards. Joining is by
//! invite code; rejoining re-accepts the existing row.

use super::{all, first, record, require_membership, Patch};
use crate::context::{request_context, require_user};
use crate::model::{Household, ACCEPTED, LEFT};
use crate::projection::{columns_for, project, Projection};
use crate::row_store::{key_of, RowStore};
use crate::selection::Selection;
use crate::types::DateTime;
use crate::{Described, Error};
use async_graphql::{Context, InputObject, Object, Result, SimpleObject};
use rand::Rng;
use serde_json::{json, Value};
use uuid::Uuid;

const INVITE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const INVITE_LENGTH: usize = 8;

/// Random 8 character invite code over `[A-Z0-9]`.
pub fn invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_LENGTH)
        .map(|_| INVITE_ALPHABET[rng.gen_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}

/// Households `user_id` currently belongs to.
async fn member_households(
    store: &RowStore,
    user_id: Uuid,
    columns: Projection,
) -> crate::Result<Vec<Household>> {
    let household_ids: Vec<String> = store
        .table("roommates")
        .select("household_id")
        .eq("user_id", user_id.to_string())
        .eq("status", ACCEPTED)
        .execute()
        .await?
        .iter()
        .filter_map(|row| key_of(row, "household_id"))
        .collect();

    if household_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = store
        .table("households")
        .select(columns)
        .in_set("id", household_ids)
        .execute()
        .await?;
    all(rows)
}

/// Fail unless `user_id` created `household_id`.
async fn require_creator(
    store: &RowStore,
    user_id: Uuid,
    household_id: &str,
    action: &str,
) -> crate::Result<()> {
    let creator = store
        .table("households")
        .select("created_by")
        .eq("id", household_id)
        .execute_first()
        .await?
        .and_then(|row| key_of(&row, "created_by"));

    if creator.as_deref() != Some(user_id.to_string().as_str()) {
        return Err(Error::NotAuthorized(format!(
            "Not authorized to {} this household",
            action
        )));
    }
    Ok(())
}

#[derive(InputObject)]
pub struct CreateHouseholdInput {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub rent_amount: Option<f64>,
    /// Defaults to `USD`
    pub currency: Option<String>,
    pub household_type: Option<String>,
    pub amenities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

#[derive(InputObject)]
pub struct UpdateHouseholdInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub rent_amount: Option<f64>,
    pub currency: Option<String>,
    pub household_type: Option<String>,
    pub amenities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub is_available: Option<bool>,
}

#[derive(SimpleObject)]
pub struct LeaveHouseholdResult {
    pub success: bool,
    /// Households the caller still belongs to
    pub remaining_households: Vec<Household>,
}

#[derive(Default)]
pub struct HouseholdQueries;

#[Object]
impl HouseholdQueries {
    /// Get a household by ID
    async fn household(&self, ctx: &Context<'_>, household_id: String) -> Result<Option<Household>> {
        let rc = request_context(ctx)?;
        let rows = rc
            .store
            .table("households")
            .select(columns_for::<Household>(ctx))
            .eq("id", household_id)
            .execute()
            .await?;
        Ok(first(rows)?)
    }

    /// List households
    async fn list(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = false)] available_only: bool,
        #[graphql(default = 10)] limit: i32,
    ) -> Result<Vec<Household>> {
        let rc = request_context(ctx)?;
        let mut query = rc
            .store
            .table("households")
            .select(columns_for::<Household>(ctx));
        if available_only {
            query = query.eq("is_available", true);
        }
        let rows = query.limit(super::limit(limit)).execute().await?;
        Ok(all(rows)?)
    }

    /// Households the caller belongs to; empty when anonymous
    async fn my_households(&self, ctx: &Context<'_>) -> Result<Vec<Household>> {
        let rc = request_context(ctx)?;
        let Some(user_id) = rc.user_id else {
            return Ok(Vec::new());
        };
        Ok(member_households(&rc.store, user_id, columns_for::<Household>(ctx)).await?)
    }
}

#[derive(Default)]
pub struct HouseholdMutations;

#[Object]
impl HouseholdMutations {
    /// Create a household with the caller as its first roommate
    async fn create_household(
        &self,
        ctx: &Context<'_>,
        input: CreateHouseholdInput,
    ) -> Result<Option<Household>> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;

        let household = record([
            ("name", json!(input.name)),
            ("description", json!(input.description)),
            ("address", json!(input.address)),
            ("rent_amount", json!(input.rent_amount)),
            ("currency", json!(input.currency.unwrap_or_else(|| "USD".to_string()))),
            ("household_type", json!(input.household_type)),
            ("amenities", json!(input.amenities)),
            ("images", json!(input.images)),
            ("is_available", json!(true)),
            ("created_by", json!(user_id.to_string())),
            ("invite_code", json!(invite_code())),
        ]);

        let Some(created) = store
            .table("households")
            .insert(household)
            .execute_first()
            .await?
        else {
            return Ok(None);
        };

        let household_id = key_of(&created, "id")
            .ok_or_else(|| Error::InvalidInput("Created household has no id".to_string()))?;
        store
            .table("roommates")
            .insert(record([
                ("user_id", json!(user_id.to_string())),
                ("household_id", json!(household_id)),
                ("status", json!(ACCEPTED)),
            ]))
            .execute()
            .await?;

        tracing::info!(%user_id, %household_id, "household created");
        Ok(first(vec![created])?)
    }

    /// Update a household; creator only
    async fn update_household(
        &self,
        ctx: &Context<'_>,
        household_id: String,
        input: UpdateHouseholdInput,
    ) -> Result<Option<Household>> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        require_creator(store, user_id, &household_id, "update").await?;

        let patch = Patch::new()
            .set("name", input.name)
            .set("description", input.description)
            .set("address", input.address)
            .set("rent_amount", input.rent_amount)
            .set("currency", input.currency)
            .set("household_type", input.household_type)
            .set("amenities", input.amenities)
            .set("images", input.images)
            .set("is_available", input.is_available)
            .into_row()?;

        let rows = store
            .table("households")
            .update(patch)
            .eq("id", household_id)
            .execute()
            .await?;
        Ok(first(rows)?)
    }

    /// Delete a household; creator only
    async fn delete_household(&self, ctx: &Context<'_>, household_id: String) -> Result<bool> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        require_creator(store, user_id, &household_id, "delete").await?;

        store
            .table("households")
            .delete()
            .eq("id", household_id)
            .execute()
            .await?;
        Ok(true)
    }

    /// Join the household holding `invite_code`
    async fn join_household(&self, ctx: &Context<'_>, invite_code: String) -> Result<Household> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;

        let code = invite_code.trim().to_uppercase();
        let household = store
            .table("households")
            .select(columns_for::<Household>(ctx))
            .eq("invite_code", code)
            .execute_first()
            .await?
            .ok_or_else(|| Error::NotFound("Invalid invite code".to_string()))?;
        let household_id = key_of(&household, "id")
            .ok_or_else(|| Error::NotFound("Invalid invite code".to_string()))?;

        let existing = store
            .table("roommates")
            .select("id,status")
            .eq("user_id", user_id.to_string())
            .eq("household_id", household_id.as_str())
            .execute_first()
            .await?;

        match existing {
            Some(row) if key_of(&row, "status").as_deref() == Some(ACCEPTED) => {
                return Err(Error::InvalidInput("Already a member of this household".to_string()).into());
            }
            Some(row) => {
                let roommate_id = key_of(&row, "id").unwrap_or_default();
                store
                    .table("roommates")
                    .update(record([
                        ("status", json!(ACCEPTED)),
                        ("joined_at", Value::from(DateTime::now())),
                        ("left_at", Value::Null),
                    ]))
                    .eq("id", roommate_id)
                    .execute()
                    .await?;
            }
            None => {
                store
                    .table("roommates")
                    .insert(record([
                        ("user_id", json!(user_id.to_string())),
                        ("household_id", json!(household_id)),
                        ("status", json!(ACCEPTED)),
                    ]))
                    .execute()
                    .await?;
            }
        }

        request_context(ctx)?.loaders.forget_memberships().await;

        tracing::info!(%user_id, %household_id, "household joined");
        Ok(crate::model::decode(household)?)
    }

    /// Leave a household the caller belongs to
    async fn leave_household(
        &self,
        ctx: &Context<'_>,
        household_id: String,
    ) -> Result<LeaveHouseholdResult> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        require_membership(store, user_id, &household_id).await?;

        store
            .table("roommates")
            .update(record([
                ("status", json!(LEFT)),
                ("left_at", Value::from(DateTime::now())),
            ]))
            .eq("user_id", user_id.to_string())
            .eq("household_id", household_id.as_str())
            .execute()
            .await?;
        request_context(ctx)?.loaders.forget_memberships().await;

        let selection = Selection::from_context(ctx);
        let columns = project(
            Household::descriptor(),
            selection.child("remainingHouseholds"),
        );
        let remaining_households = member_households(store, user_id, columns).await?;

        tracing::info!(%user_id, %household_id, "household left");
        Ok(LeaveHouseholdResult {
            success: true,
            remaining_households,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_code_shape() {
        for _ in 0..50 {
            let code = invite_code();
            assert_eq!(code.len(), 8);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }
}
