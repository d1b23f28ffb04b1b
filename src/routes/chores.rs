//! Chores and chore assignments
//!
//! Assignments carry no household of their own; they belong to the household
//! of their chore. Completing one goes through the
//! `complete_chore_and_award_points` procedure, which checks ownership and
//! awards the points atomically.

use super::{all, first, record, require_membership, Patch};
use crate::context::{request_context, require_user, RequestContext};
use crate::model::{Chore, ChoreAssignment};
use crate::projection::{columns_for, Projection};
use crate::row_store::{key_of, RowStore};
use crate::types::DateTime;
use crate::Error;
use async_graphql::{Context, InputObject, Object, Result};
use serde_json::{json, Value};
use uuid::Uuid;

/// Household owning `chore_id`.
async fn chore_household(store: &RowStore, chore_id: &str) -> crate::Result<String> {
    store
        .table("chores")
        .select("household_id")
        .eq("id", chore_id)
        .execute_first()
        .await?
        .and_then(|row| key_of(&row, "household_id"))
        .ok_or_else(|| Error::NotFound("Chore not found".to_string()))
}

/// Assignments of a household's chores, soonest due first.
///
/// The household's chore rows are fetched whole and primed into the chore
/// loader, so `ChoreAssignment.chore` resolves without another round trip.
async fn household_assignments(
    request: &RequestContext,
    household_id: &str,
    assignee: Option<Uuid>,
    include_completed: bool,
    limit: usize,
    columns: Projection,
) -> crate::Result<Vec<ChoreAssignment>> {
    let store = &request.store;
    let chores = store
        .table("chores")
        .select("*")
        .eq("household_id", household_id)
        .execute()
        .await?;

    let mut chore_ids = Vec::with_capacity(chores.len());
    for chore in chores {
        if let Some(id) = key_of(&chore, "id") {
            request.loaders.chore.prime(id.clone(), Some(chore)).await;
            chore_ids.push(id);
        }
    }
    if chore_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = store
        .table("chore_assignments")
        .select(columns)
        .in_set("chore_id", chore_ids);
    if let Some(user_id) = assignee {
        query = query.eq("user_id", user_id.to_string());
    }
    if !include_completed {
        query = query.eq("is_complete", false);
    }
    let rows = query.order("due_date", false).limit(limit).execute().await?;
    all(rows)
}

#[derive(InputObject)]
pub struct CreateChoreInput {
    pub household_id: String,
    pub title: String,
    pub description: Option<String>,
    /// `daily`, `weekly`, `monthly` or `none`
    #[graphql(default_with = "String::from(\"none\")")]
    pub recurrence: String,
    #[graphql(default = 10)]
    pub points: i32,
    #[graphql(default = false)]
    pub requires_proof: bool,
}

#[derive(InputObject)]
pub struct UpdateChoreInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub recurrence: Option<String>,
    pub points: Option<i32>,
    pub requires_proof: Option<bool>,
}

#[derive(InputObject)]
pub struct CreateChoreAssignmentInput {
    pub chore_id: String,
    pub user_id: String,
    pub due_date: DateTime,
}

#[derive(InputObject)]
pub struct CompleteChoreAssignmentInput {
    pub assignment_id: String,
    pub proof_url: Option<String>,
}

#[derive(Default)]
pub struct ChoreQueries;

#[Object]
impl ChoreQueries {
    /// Get a chore by ID
    async fn chore(&self, ctx: &Context<'_>, chore_id: String) -> Result<Option<Chore>> {
        let rows = request_context(ctx)?
            .store
            .table("chores")
            .select(columns_for::<Chore>(ctx))
            .eq("id", chore_id)
            .execute()
            .await?;
        Ok(first(rows)?)
    }

    /// A household's chores, newest first
    async fn household_chores(
        &self,
        ctx: &Context<'_>,
        household_id: String,
        #[graphql(default = 50)] limit: i32,
    ) -> Result<Vec<Chore>> {
        let rows = request_context(ctx)?
            .store
            .table("chores")
            .select(columns_for::<Chore>(ctx))
            .eq("household_id", household_id)
            .order("created_at", true)
            .limit(super::limit(limit))
            .execute()
            .await?;
        Ok(all(rows)?)
    }

    /// The caller's assignments in a household
    async fn my_chore_assignments(
        &self,
        ctx: &Context<'_>,
        household_id: String,
        #[graphql(default = false)] include_completed: bool,
        #[graphql(default = 50)] limit: i32,
    ) -> Result<Vec<ChoreAssignment>> {
        let user_id = require_user(ctx)?;
        Ok(household_assignments(
            request_context(ctx)?,
            &household_id,
            Some(user_id),
            include_completed,
            super::limit(limit),
            columns_for::<ChoreAssignment>(ctx),
        )
        .await?)
    }

    /// Every assignment in a household
    async fn household_chore_assignments(
        &self,
        ctx: &Context<'_>,
        household_id: String,
        #[graphql(default = false)] include_completed: bool,
        #[graphql(default = 50)] limit: i32,
    ) -> Result<Vec<ChoreAssignment>> {
        Ok(household_assignments(
            request_context(ctx)?,
            &household_id,
            None,
            include_completed,
            super::limit(limit),
            columns_for::<ChoreAssignment>(ctx),
        )
        .await?)
    }
}

#[derive(Default)]
pub struct ChoreMutations;

#[Object]
impl ChoreMutations {
    /// Create a chore template in a household the caller belongs to
    async fn create_chore(&self, ctx: &Context<'_>, input: CreateChoreInput) -> Result<Option<Chore>> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        require_membership(store, user_id, &input.household_id).await?;

        let chore = record([
            ("household_id", json!(input.household_id)),
            ("title", json!(input.title)),
            ("description", json!(input.description)),
            ("recurrence", json!(input.recurrence)),
            ("points", json!(input.points)),
            ("requires_proof", json!(input.requires_proof)),
            ("created_by", json!(user_id.to_string())),
        ]);
        let rows = store.table("chores").insert(chore).execute().await?;
        Ok(first(rows)?)
    }

    async fn update_chore(
        &self,
        ctx: &Context<'_>,
        chore_id: String,
        input: UpdateChoreInput,
    ) -> Result<Option<Chore>> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        let household_id = chore_household(store, &chore_id).await?;
        require_membership(store, user_id, &household_id).await?;

        let patch = Patch::new()
            .set("title", input.title)
            .set("description", input.description)
            .set("recurrence", input.recurrence)
            .set("points", input.points)
            .set("requires_proof", input.requires_proof)
            .into_row()?;

        let rows = store
            .table("chores")
            .update(patch)
            .eq("id", chore_id)
            .execute()
            .await?;
        Ok(first(rows)?)
    }

    /// Delete a chore; its assignments go with it
    async fn delete_chore(&self, ctx: &Context<'_>, chore_id: String) -> Result<bool> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        let household_id = chore_household(store, &chore_id).await?;
        require_membership(store, user_id, &household_id).await?;

        store.table("chores").delete().eq("id", chore_id).execute().await?;
        Ok(true)
    }

    /// Assign a chore to a member of its household
    async fn create_chore_assignment(
        &self,
        ctx: &Context<'_>,
        input: CreateChoreAssignmentInput,
    ) -> Result<Option<ChoreAssignment>> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        let household_id = chore_household(store, &input.chore_id).await?;
        require_membership(store, user_id, &household_id).await?;

        let assignee = Uuid::parse_str(&input.user_id)
            .map_err(|_| Error::InvalidInput("Invalid user id".to_string()))?;
        if require_membership(store, assignee, &household_id).await.is_err() {
            return Err(Error::InvalidInput(
                "Assigned user is not a member of this household".to_string(),
            )
            .into());
        }

        let assignment = record([
            ("chore_id", json!(input.chore_id)),
            ("user_id", json!(input.user_id)),
            ("due_date", Value::from(input.due_date)),
        ]);
        let rows = store
            .table("chore_assignments")
            .insert(assignment)
            .execute()
            .await?;
        Ok(first(rows)?)
    }

    /// Complete one of the caller's assignments and award the chore's points
    async fn complete_chore_assignment(
        &self,
        ctx: &Context<'_>,
        input: CompleteChoreAssignmentInput,
    ) -> Result<Option<ChoreAssignment>> {
        let user_id = require_user(ctx)?;
        let params = json!({
            "p_assignment_id": input.assignment_id.as_str(),
            "p_user_id": user_id.to_string(),
            "p_proof_url": input.proof_url.as_deref(),
        });

        let rows = request_context(ctx)?
            .store
            .rpc("complete_chore_and_award_points", params)
            .execute()
            .await?;
        let completed: Option<ChoreAssignment> = first(rows)?;
        if completed.is_some() {
            tracing::info!(%user_id, assignment_id = %input.assignment_id, "chore assignment completed");
        }
        Ok(completed)
    }

    async fn delete_chore_assignment(&self, ctx: &Context<'_>, assignment_id: String) -> Result<bool> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;

        let chore_id = store
            .table("chore_assignments")
            .select("chore_id")
            .eq("id", assignment_id.as_str())
            .execute_first()
            .await?
            .and_then(|row| key_of(&row, "chore_id"))
            .ok_or_else(|| Error::NotFound("Assignment not found".to_string()))?;
        let household_id = chore_household(store, &chore_id).await?;
        require_membership(store, user_id, &household_id).await?;

        store
            .table("chore_assignments")
            .delete()
            .eq("id", assignment_id)
            .execute()
            .await?;
        Ok(true)
    }
}
