use super::{decode, decode_all, key, Household, Profile};
use crate::context::request_context;
use crate::descriptor::{Described, Descriptor, FieldDecl, FieldType};
use crate::types::DateTime;
use async_graphql::{ComplexObject, Context, Result, SimpleObject, ID};
use serde::Deserialize;

/// A shared cost paid by one roommate
#[derive(SimpleObject, Deserialize, Default, Clone, Debug)]
#[graphql(complex)]
#[serde(default)]
pub struct Expense {
    pub id: Option<ID>,
    pub household_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub category: Option<String>,
    /// User who paid and is owed the splits
    pub paid_by: Option<String>,
    pub created_at: Option<DateTime>,
    pub due_date: Option<DateTime>,
}

static EXPENSE: Descriptor = Descriptor {
    name: "Expense",
    table: "expenses",
    fields: &[
        FieldDecl::stored("id", FieldType::Id),
        FieldDecl::stored("household_id", FieldType::String),
        FieldDecl::stored("title", FieldType::String),
        FieldDecl::stored("description", FieldType::String),
        FieldDecl::stored("amount", FieldType::Float),
        FieldDecl::stored("currency", FieldType::String),
        FieldDecl::stored("category", FieldType::String),
        FieldDecl::stored("paid_by", FieldType::String),
        FieldDecl::stored("created_at", FieldType::Timestamp),
        FieldDecl::stored("due_date", FieldType::Timestamp),
        FieldDecl::computed("household", FieldType::Object("Household")),
        FieldDecl::computed("splits", FieldType::ObjectList("ExpenseSplit")),
    ],
};

impl Described for Expense {
    fn descriptor() -> &'static Descriptor {
        &EXPENSE
    }
}

#[ComplexObject]
impl Expense {
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

    /// Each roommate's share
    async fn splits(&self, ctx: &Context<'_>) -> Result<Option<Vec<ExpenseSplit>>> {
        let Some(id) = key(&self.id) else {
            return Ok(Some(Vec::new()));
        };
        let rows = request_context(ctx)?
            .loaders
            .expense_splits_by_expense
            .load(id)
            .await?;
        Ok(Some(decode_all(rows)?))
    }
}

/// One roommate's share of an expense
#[derive(SimpleObject, Deserialize, Default, Clone, Debug)]
#[graphql(complex)]
#[serde(default)]
pub struct ExpenseSplit {
    pub id: Option<ID>,
    pub expense_id: Option<String>,
    pub user_id: Option<String>,
    pub amount: Option<f64>,
    pub is_paid: Option<bool>,
    pub paid_at: Option<DateTime>,
    pub payment_url: Option<String>,
    pub payment_method: Option<String>,
}

static EXPENSE_SPLIT: Descriptor = Descriptor {
    name: "ExpenseSplit",
    table: "expense_splits",
    fields: &[
        FieldDecl::stored("id", FieldType::Id),
        FieldDecl::stored("expense_id", FieldType::String),
        FieldDecl::stored("user_id", FieldType::String),
        FieldDecl::stored("amount", FieldType::Float),
        FieldDecl::stored("is_paid", FieldType::Boolean),
        FieldDecl::stored("paid_at", FieldType::Timestamp),
        FieldDecl::stored("payment_url", FieldType::String),
        FieldDecl::stored("payment_method", FieldType::String),
        FieldDecl::computed("expense", FieldType::Object("Expense")),
        FieldDecl::computed("profile", FieldType::Object("Profile")),
    ],
};

impl Described for ExpenseSplit {
    fn descriptor() -> &'static Descriptor {
        &EXPENSE_SPLIT
    }
}

#[ComplexObject]
impl ExpenseSplit {
    async fn expense(&self, ctx: &Context<'_>) -> Result<Option<Expense>> {
        let Some(expense_id) = self.expense_id.clone() else {
            return Ok(None);
        };
        let row = request_context(ctx)?.loaders.expense.load(expense_id).await?;
        Ok(row.map(decode).transpose()?)
    }

    /// The roommate who owes this share
    async fn profile(&self, ctx: &Context<'_>) -> Result<Option<Profile>> {
        let Some(user_id) = self.user_id.clone() else {
            return Ok(None);
        };
        let row = request_context(ctx)?.loaders.profile.load(user_id).await?;
        Ok(row.map(decode).transpose()?)
    }
}
