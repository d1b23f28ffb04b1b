//! Expense queries and mutations
//!
//! An expense is paid by its creator and split equally between the listed
//! roommates; the creator's own split starts out paid.

use super::{all, first, record, require_membership, Patch};
use crate::context::{request_context, require_user};
use crate::model::{Expense, ExpenseSplit, Profile};
use crate::payment_urls::{payment_url, PaymentInfo, PaymentMethod};
use crate::projection::columns_for;
use crate::row_store::{key_of, RowStore};
use crate::types::DateTime;
use crate::Error;
use async_graphql::{Context, InputObject, Object, Result, SimpleObject};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(InputObject)]
pub struct CreateExpenseInput {
    pub household_id: String,
    pub title: String,
    pub description: Option<String>,
    pub amount: f64,
    /// Defaults to `USD`
    pub currency: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<DateTime>,
    /// User IDs sharing the expense
    pub split_with: Vec<String>,
}

#[derive(InputObject)]
pub struct UpdateExpenseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<DateTime>,
}

#[derive(InputObject)]
pub struct MarkExpensePaidInput {
    pub expense_split_id: String,
}

#[derive(InputObject)]
#[graphql(name = "GeneratePaymentURLInput")]
pub struct GeneratePaymentUrlInput {
    pub expense_split_id: String,
    /// Falls back to the payee's preferred method, then their first available one
    pub payment_method: Option<String>,
}

#[derive(SimpleObject, Debug)]
#[graphql(name = "PaymentURLResult")]
pub struct PaymentUrlResult {
    pub payment_url: String,
    pub payment_method: String,
    pub available_methods: Vec<String>,
}

/// Fail unless `user_id` paid `expense_id`.
async fn require_payer(store: &RowStore, user_id: Uuid, expense_id: &str, action: &str) -> crate::Result<()> {
    let payer = store
        .table("expenses")
        .select("paid_by")
        .eq("id", expense_id)
        .execute_first()
        .await?
        .and_then(|row| key_of(&row, "paid_by"));

    if payer.as_deref() != Some(user_id.to_string().as_str()) {
        return Err(Error::NotAuthorized(format!(
            "Not authorized to {} this expense",
            action
        )));
    }
    Ok(())
}

/// Choose how to pay: the requested method, else the payee's preference, else
/// the first method they accept.
fn choose_method(
    requested: Option<&str>,
    info: &PaymentInfo,
    available: &[PaymentMethod],
) -> crate::Result<PaymentMethod> {
    let not_available = |name: &str| {
        let names: Vec<&str> = available.iter().map(PaymentMethod::as_str).collect();
        Error::InvalidInput(format!(
            "Payment method '{}' not available for this user. Available: {}",
            name,
            names.join(", ")
        ))
    };

    match requested.filter(|m| !m.is_empty()) {
        Some(name) => match name.parse::<PaymentMethod>() {
            Ok(method) if available.contains(&method) => Ok(method),
            _ => Err(not_available(name)),
        },
        None => {
            let preferred = info
                .preferred_payment_method
                .as_deref()
                .and_then(|m| m.parse::<PaymentMethod>().ok())
                .filter(|m| available.contains(m));
            preferred
                .or_else(|| available.first().copied())
                .ok_or_else(|| not_available(""))
        }
    }
}

#[derive(Default)]
pub struct ExpenseQueries;

#[Object]
impl ExpenseQueries {
    /// Get an expense by ID
    async fn expense(&self, ctx: &Context<'_>, expense_id: String) -> Result<Option<Expense>> {
        let rows = request_context(ctx)?
            .store
            .table("expenses")
            .select(columns_for::<Expense>(ctx))
            .eq("id", expense_id)
            .execute()
            .await?;
        Ok(first(rows)?)
    }

    /// A household's expenses, newest first
    async fn household_expenses(
        &self,
        ctx: &Context<'_>,
        household_id: String,
        #[graphql(default = 20)] limit: i32,
    ) -> Result<Vec<Expense>> {
        let rows = request_context(ctx)?
            .store
            .table("expenses")
            .select(columns_for::<Expense>(ctx))
            .eq("household_id", household_id)
            .order("created_at", true)
            .limit(super::limit(limit))
            .execute()
            .await?;
        Ok(all(rows)?)
    }

    /// Expenses the caller has a split in, newest first
    async fn my_expenses(&self, ctx: &Context<'_>) -> Result<Vec<Expense>> {
        let rc = request_context(ctx)?;
        let Some(user_id) = rc.user_id else {
            return Ok(Vec::new());
        };

        let expense_ids: Vec<String> = rc
            .store
            .table("expense_splits")
            .select("expense_id")
            .eq("user_id", user_id.to_string())
            .execute()
            .await?
            .iter()
            .filter_map(|row| key_of(row, "expense_id"))
            .collect();
        if expense_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = rc
            .store
            .table("expenses")
            .select(columns_for::<Expense>(ctx))
            .in_set("id", expense_ids)
            .order("created_at", true)
            .execute()
            .await?;
        Ok(all(rows)?)
    }

    /// All splits of one expense
    async fn expense_splits(&self, ctx: &Context<'_>, expense_id: String) -> Result<Vec<ExpenseSplit>> {
        let rows = request_context(ctx)?
            .store
            .table("expense_splits")
            .select(columns_for::<ExpenseSplit>(ctx))
            .eq("expense_id", expense_id)
            .execute()
            .await?;
        Ok(all(rows)?)
    }
}

#[derive(Default)]
pub struct ExpenseMutations;

#[Object]
impl ExpenseMutations {
    /// Create an expense paid by the caller and split it equally
    async fn create_expense(&self, ctx: &Context<'_>, input: CreateExpenseInput) -> Result<Option<Expense>> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        require_membership(store, user_id, &input.household_id).await?;

        if input.split_with.is_empty() {
            return Err(Error::InvalidInput("splitWith must name at least one user".to_string()).into());
        }

        let expense = record([
            ("household_id", json!(input.household_id)),
            ("title", json!(input.title)),
            ("description", json!(input.description)),
            ("amount", json!(input.amount)),
            ("currency", json!(input.currency.as_deref().unwrap_or("USD"))),
            ("category", json!(input.category)),
            ("paid_by", json!(user_id.to_string())),
            ("due_date", input.due_date.map(Value::from).unwrap_or(Value::Null)),
        ]);
        let Some(created) = store.table("expenses").insert(expense).execute_first().await? else {
            return Ok(None);
        };
        let expense_id = key_of(&created, "id")
            .ok_or_else(|| Error::InvalidInput("Created expense has no id".to_string()))?;

        let share = input.amount / input.split_with.len() as f64;
        let creator = user_id.to_string();
        let splits = input
            .split_with
            .iter()
            .map(|member| {
                record([
                    ("expense_id", json!(expense_id)),
                    ("user_id", json!(member)),
                    ("amount", json!(share)),
                    ("is_paid", json!(*member == creator)),
                ])
            })
            .collect();
        store.table("expense_splits").insert_many(splits).execute().await?;

        tracing::info!(%user_id, %expense_id, splits = input.split_with.len(), "expense created");
        Ok(first(vec![created])?)
    }

    /// Update an expense; payer only
    async fn update_expense(
        &self,
        ctx: &Context<'_>,
        expense_id: String,
        input: UpdateExpenseInput,
    ) -> Result<Option<Expense>> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        require_payer(store, user_id, &expense_id, "update").await?;

        let patch = Patch::new()
            .set("title", input.title)
            .set("description", input.description)
            .set("amount", input.amount)
            .set("currency", input.currency)
            .set("category", input.category)
            .set("due_date", input.due_date)
            .into_row()?;

        let rows = store
            .table("expenses")
            .update(patch)
            .eq("id", expense_id)
            .execute()
            .await?;
        Ok(first(rows)?)
    }

    /// Mark the caller's own split as paid
    async fn mark_expense_paid(&self, ctx: &Context<'_>, input: MarkExpensePaidInput) -> Result<bool> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;

        let owner = store
            .table("expense_splits")
            .select("user_id")
            .eq("id", input.expense_split_id.as_str())
            .execute_first()
            .await?
            .and_then(|row| key_of(&row, "user_id"));
        if owner.as_deref() != Some(user_id.to_string().as_str()) {
            return Err(Error::NotAuthorized("Not authorized to mark this split as paid".to_string()).into());
        }

        store
            .table("expense_splits")
            .update(record([
                ("is_paid", json!(true)),
                ("paid_at", Value::from(DateTime::now())),
            ]))
            .eq("id", input.expense_split_id)
            .execute()
            .await?;
        Ok(true)
    }

    /// Delete an expense; payer only
    async fn delete_expense(&self, ctx: &Context<'_>, expense_id: String) -> Result<bool> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;
        require_payer(store, user_id, &expense_id, "delete").await?;

        store.table("expenses").delete().eq("id", expense_id).execute().await?;
        Ok(true)
    }

    /// Build a payment link for the caller's split and remember it on the split
    async fn generate_payment_url(
        &self,
        ctx: &Context<'_>,
        input: GeneratePaymentUrlInput,
    ) -> Result<Option<PaymentUrlResult>> {
        let user_id = require_user(ctx)?;
        let store = &request_context(ctx)?.store;

        let split: ExpenseSplit = store
            .table("expense_splits")
            .select("*")
            .eq("id", input.expense_split_id.as_str())
            .execute()
            .await
            .map_err(Error::from)
            .and_then(first)?
            .ok_or_else(|| Error::NotFound("Expense split not found".to_string()))?;

        if split.user_id.as_deref() != Some(user_id.to_string().as_str()) {
            return Err(Error::NotAuthorized(
                "Not authorized to generate payment URL for this split".to_string(),
            )
            .into());
        }

        let expense: Expense = store
            .table("expenses")
            .select("title,description,paid_by,currency")
            .eq("id", split.expense_id.clone().unwrap_or_default())
            .execute()
            .await
            .map_err(Error::from)
            .and_then(first)?
            .ok_or_else(|| Error::NotFound("Expense not found".to_string()))?;

        let payee: Profile = store
            .table("profiles")
            .select("venmo_handle,paypal_email,cashapp_handle,zelle_email,preferred_payment_method")
            .eq("id", expense.paid_by.clone().unwrap_or_default())
            .execute()
            .await
            .map_err(Error::from)
            .and_then(first)?
            .ok_or_else(|| Error::NotFound("Payee profile not found".to_string()))?;

        let info = PaymentInfo::from(&payee);
        let available = info.available_methods();
        if available.is_empty() {
            return Err(Error::InvalidInput("Payee has not set up any payment methods".to_string()).into());
        }
        let method = choose_method(input.payment_method.as_deref(), &info, &available)?;

        let mut note = expense.title.clone().unwrap_or_default();
        if let Some(description) = expense.description.as_deref().filter(|d| !d.is_empty()) {
            note.push_str(" - ");
            note.push_str(description);
        }
        let currency = expense.currency.as_deref().unwrap_or("USD");
        let amount = split.amount.unwrap_or_default();

        let url = payment_url(method, &info, amount, Some(note.as_str()), currency)
            .ok_or_else(|| Error::InvalidInput("Failed to generate payment URL".to_string()))?;

        store
            .table("expense_splits")
            .update(record([
                ("payment_url", json!(url)),
                ("payment_method", json!(method.as_str())),
            ]))
            .eq("id", input.expense_split_id)
            .execute()
            .await?;

        Ok(Some(PaymentUrlResult {
            payment_url: url,
            payment_method: method.to_string(),
            available_methods: available.iter().map(|m| m.to_string()).collect(),
        }))
    }
}
