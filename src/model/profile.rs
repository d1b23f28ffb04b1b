use super::{decode_all, decode_present, key, ExpenseSplit, Household, Message, Notification, ACCEPTED};
use crate::context::request_context;
use crate::descriptor::{Described, Descriptor, FieldDecl, FieldType};
use crate::row_store::key_of;
use crate::types::DateTime;
use async_graphql::{ComplexObject, Context, Result, SimpleObject, ID};
use serde::Deserialize;

/// User profile
#[derive(SimpleObject, Deserialize, Default, Clone, Debug)]
#[graphql(complex)]
#[serde(default)]
pub struct Profile {
    pub id: Option<ID>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub venmo_handle: Option<String>,
    pub paypal_email: Option<String>,
    pub cashapp_handle: Option<String>,
    pub zelle_email: Option<String>,
    pub preferred_payment_method: Option<String>,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

static PROFILE: Descriptor = Descriptor {
    name: "Profile",
    table: "profiles",
    fields: &[
        FieldDecl::stored("id", FieldType::Id),
        FieldDecl::stored("email", FieldType::String),
        FieldDecl::stored("full_name", FieldType::String),
        FieldDecl::stored("avatar_url", FieldType::String),
        FieldDecl::stored("bio", FieldType::String),
        FieldDecl::stored("venmo_handle", FieldType::String),
        FieldDecl::stored("paypal_email", FieldType::String),
        FieldDecl::stored("cashapp_handle", FieldType::String),
        FieldDecl::stored("zelle_email", FieldType::String),
        FieldDecl::stored("preferred_payment_method", FieldType::String),
        FieldDecl::stored("created_at", FieldType::Timestamp),
        FieldDecl::stored("updated_at", FieldType::Timestamp),
        FieldDecl::computed("households", FieldType::ObjectList("Household")),
        FieldDecl::computed("expense_splits", FieldType::ObjectList("ExpenseSplit")),
        FieldDecl::computed("notifications", FieldType::ObjectList("Notification")),
        FieldDecl::computed("sent_messages", FieldType::ObjectList("Message")),
    ],
};

impl Described for Profile {
    fn descriptor() -> &'static Descriptor {
        &PROFILE
    }
}

#[ComplexObject]
impl Profile {
    /// Households this user is an accepted member of
    async fn households(&self, ctx: &Context<'_>) -> Result<Option<Vec<Household>>> {
        let Some(id) = key(&self.id) else {
            return Ok(Some(Vec::new()));
        };
        let loaders = &request_context(ctx)?.loaders;

        let household_ids: Vec<String> = loaders
            .roommates_by_user
            .load(id)
            .await?
            .iter()
            .filter(|row| key_of(row, "status").as_deref() == Some(ACCEPTED))
            .filter_map(|row| key_of(row, "household_id"))
            .collect();

        let rows = loaders.household.load_many(household_ids).await?;
        Ok(Some(decode_present(rows)?))
    }

    async fn expense_splits(&self, ctx: &Context<'_>) -> Result<Option<Vec<ExpenseSplit>>> {
        let Some(id) = key(&self.id) else {
            return Ok(Some(Vec::new()));
        };
        let rows = request_context(ctx)?
            .loaders
            .expense_splits_by_user
            .load(id)
            .await?;
        Ok(Some(decode_all(rows)?))
    }

    async fn notifications(&self, ctx: &Context<'_>) -> Result<Option<Vec<Notification>>> {
        let Some(id) = key(&self.id) else {
            return Ok(Some(Vec::new()));
        };
        let rows = request_context(ctx)?
            .loaders
            .notifications_by_user
            .load(id)
            .await?;
        Ok(Some(decode_all(rows)?))
    }

    async fn sent_messages(&self, ctx: &Context<'_>) -> Result<Option<Vec<Message>>> {
        let Some(id) = key(&self.id) else {
            return Ok(Some(Vec::new()));
        };
        let rows = request_context(ctx)?
            .loaders
            .messages_by_sender
            .load(id)
            .await?;
        Ok(Some(decode_all(rows)?))
    }
}
