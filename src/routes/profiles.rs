//! Profile queries and mutations

use super::{all, first, Patch};
use crate::context::{get_user_id, request_context, require_user};
use crate::model::Profile;
use crate::payment_urls::PaymentMethod;
use crate::projection::columns_for;
use crate::Error;
use async_graphql::{Context, InputObject, Object, Result};

#[derive(InputObject)]
pub struct UpdateProfileInput {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub venmo_handle: Option<String>,
    pub paypal_email: Option<String>,
    pub cashapp_handle: Option<String>,
    pub zelle_email: Option<String>,
    /// One of `venmo`, `paypal`, `cashapp` or `zelle`
    pub preferred_payment_method: Option<String>,
}

#[derive(Default)]
pub struct ProfileQueries;

#[Object]
impl ProfileQueries {
    /// Get a user profile by ID
    async fn profile(&self, ctx: &Context<'_>, user_id: String) -> Result<Option<Profile>> {
        let rows = request_context(ctx)?
            .store
            .table("profiles")
            .select(columns_for::<Profile>(ctx))
            .eq("id", user_id)
            .execute()
            .await?;
        Ok(first(rows)?)
    }

    /// The caller's profile; null when anonymous
    async fn me(&self, ctx: &Context<'_>) -> Result<Option<Profile>> {
        let Some(user_id) = get_user_id(ctx) else {
            return Ok(None);
        };
        let rows = request_context(ctx)?
            .store
            .table("profiles")
            .select(columns_for::<Profile>(ctx))
            .eq("id", user_id.to_string())
            .execute()
            .await?;
        Ok(first(rows)?)
    }

    /// List profiles
    async fn list(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = 10)] limit: i32,
    ) -> Result<Vec<Profile>> {
        let rows = request_context(ctx)?
            .store
            .table("profiles")
            .select(columns_for::<Profile>(ctx))
            .limit(super::limit(limit))
            .execute()
            .await?;
        Ok(all(rows)?)
    }
}

#[derive(Default)]
pub struct ProfileMutations;

#[Object]
impl ProfileMutations {
    /// Update the caller's profile
    async fn update_profile(
        &self,
        ctx: &Context<'_>,
        input: UpdateProfileInput,
    ) -> Result<Option<Profile>> {
        let user_id = require_user(ctx)?;

        let preferred = input
            .preferred_payment_method
            .map(|method| {
                method
                    .parse::<PaymentMethod>()
                    .map(|m| m.as_str())
                    .map_err(Error::InvalidInput)
            })
            .transpose()?;

        let patch = Patch::new()
            .set("full_name", input.full_name)
            .set("avatar_url", input.avatar_url)
            .set("bio", input.bio)
            .set("venmo_handle", input.venmo_handle)
            .set("paypal_email", input.paypal_email)
            .set("cashapp_handle", input.cashapp_handle)
            .set("zelle_email", input.zelle_email)
            .set("preferred_payment_method", preferred)
            .into_row()?;

        let rows = request_context(ctx)?
            .store
            .table("profiles")
            .update(patch)
            .eq("id", user_id.to_string())
            .execute()
            .await?;
        Ok(first(rows)?)
    }
}
