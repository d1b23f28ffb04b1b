//! Test fixtures
//!
//! A seeded [`MemoryBackend`] holding two households and their data, plus a
//! helper that runs a GraphQL document against it the way the HTTP handler
//! would.

use crate::context::RequestContext;
use crate::dataloaders::DEFAULT_BATCH_DELAY;
use crate::row_store::{MemoryBackend, Row, RowStore, RowStoreError};
use crate::schema::build_schema;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Created `Maple St` (h1)
pub const ALICE: Uuid = Uuid::from_u128(0xa11ce);
/// Roommate of Alice in h1
pub const BOB: Uuid = Uuid::from_u128(0xb0b);
/// Member of `Oak Ave` (h2) only
pub const CAROL: Uuid = Uuid::from_u128(0xca201);

fn object(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        _ => Row::new(),
    }
}

/// Backend seeded with the fixture households.
pub fn fixtures() -> MemoryBackend {
    let (alice, bob, carol) = (ALICE.to_string(), BOB.to_string(), CAROL.to_string());

    MemoryBackend::new()
        .with_table(
            "profiles",
            vec![
                json!({ "id": alice, "email": "alice@example.com", "full_name": "Alice", "venmo_handle": "@alice", "preferred_payment_method": "venmo" }),
                json!({ "id": bob, "email": "bob@example.com", "full_name": "Bob", "zelle_email": "bob@bank.com" }),
                json!({ "id": carol, "email": "carol@example.com", "full_name": "Carol" }),
            ],
        )
        .with_table(
            "households",
            vec![
                json!({ "id": "h1", "name": "Maple St", "currency": "USD", "is_available": true, "created_by": alice, "invite_code": "MAPLE123" }),
                json!({ "id": "h2", "name": "Oak Ave", "currency": "USD", "is_available": false, "created_by": carol, "invite_code": "OAK45678" }),
            ],
        )
        .with_table(
            "roommates",
            vec![
                json!({ "id": "r1", "user_id": alice, "household_id": "h1", "status": "accepted" }),
                json!({ "id": "r2", "user_id": bob, "household_id": "h1", "status": "accepted" }),
                json!({ "id": "r3", "user_id": carol, "household_id": "h2", "status": "accepted" }),
            ],
        )
        .with_table(
            "expenses",
            vec![
                json!({ "id": "e1", "household_id": "h1", "title": "Groceries", "description": "Weekly shop", "amount": 60.0, "currency": "USD", "paid_by": alice, "created_at": "2024-03-01T10:00:00Z" }),
                json!({ "id": "e2", "household_id": "h1", "title": "Internet", "amount": 40.0, "currency": "USD", "paid_by": bob, "created_at": "2024-03-05T10:00:00Z" }),
            ],
        )
        .with_table(
            "expense_splits",
            vec![
                json!({ "id": "s1", "expense_id": "e1", "user_id": alice, "amount": 30.0, "is_paid": true }),
                json!({ "id": "s2", "expense_id": "e1", "user_id": bob, "amount": 30.0, "is_paid": false }),
                json!({ "id": "s3", "expense_id": "e2", "user_id": alice, "amount": 20.0, "is_paid": false }),
                json!({ "id": "s4", "expense_id": "e2", "user_id": bob, "amount": 20.0, "is_paid": true }),
            ],
        )
        .with_table(
            "messages",
            vec![
                json!({ "id": "m1", "household_id": "h1", "sender_id": alice, "content": "Hi all", "message_type": "text", "created_at": "2024-03-01T09:00:00Z" }),
                json!({ "id": "m2", "household_id": "h1", "sender_id": bob, "content": "Hey", "message_type": "text", "created_at": "2024-03-01T09:05:00Z" }),
                json!({ "id": "m3", "household_id": "h1", "sender_id": alice, "content": "Rent is due", "message_type": "expense", "metadata": { "expense_id": "e1" }, "created_at": "2024-03-01T09:10:00Z" }),
            ],
        )
        .with_table(
            "notifications",
            vec![
                json!({ "id": "n1", "user_id": alice, "title": "New expense", "type": "expense", "is_read": false, "created_at": "2024-03-02T08:00:00Z" }),
                json!({ "id": "n2", "user_id": alice, "title": "Welcome", "type": "system", "is_read": true, "created_at": "2024-03-01T08:00:00Z" }),
                json!({ "id": "n3", "user_id": bob, "title": "New expense", "type": "expense", "is_read": false, "created_at": "2024-03-02T08:00:00Z" }),
            ],
        )
        .with_table(
            "chores",
            vec![
                json!({ "id": "c1", "household_id": "h1", "title": "Dishes", "recurrence": "daily", "points": 10, "requires_proof": false, "created_by": alice }),
            ],
        )
        .with_table(
            "chore_assignments",
            vec![
                json!({ "id": "a1", "chore_id": "c1", "user_id": bob, "due_date": "2024-03-10", "is_complete": false }),
            ],
        )
        .with_rpc("complete_chore_and_award_points", |params| {
            Ok(vec![object(json!({
                "id": params["p_assignment_id"],
                "chore_id": "c1",
                "user_id": params["p_user_id"],
                "is_complete": true,
                "completed_at": "2024-03-09T12:00:00Z",
                "proof_url": params["p_proof_url"],
            }))])
        })
}

/// Run `query` as `user` against `backend` with a fresh request context.
pub async fn execute(
    backend: &Arc<MemoryBackend>,
    user: Option<Uuid>,
    query: &str,
) -> async_graphql::Response {
    let context = RequestContext::new(
        RowStore::from_backend(backend.clone()),
        user,
        DEFAULT_BATCH_DELAY,
    );
    build_schema()
        .execute(async_graphql::Request::new(query).data(context))
        .await
}

/// Response data as JSON.
pub fn data(response: &async_graphql::Response) -> Value {
    serde_json::to_value(&response.data).unwrap_or_default()
}

/// Message of the first error, if any.
pub fn first_error(response: &async_graphql::Response) -> Option<&str> {
    response.errors.first().map(|e| e.message.as_str())
}

/// Rows of `table` whose `column` equals `value`.
pub async fn rows_where(backend: &MemoryBackend, table: &str, column: &str, value: &str) -> Vec<Row> {
    backend
        .rows(table)
        .await
        .into_iter()
        .filter(|row| row.get(column) == Some(&json!(value)))
        .collect()
}

/// Make every request against `table` fail like an unreachable store.
pub async fn break_table(backend: &MemoryBackend, table: &str) {
    backend
        .fail(table, RowStoreError::Transport("connection refused".to_string()))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row_store::Action;

    fn backend() -> Arc<MemoryBackend> {
        Arc::new(fixtures())
    }

    #[tokio::test]
    async fn test_nested_household_query_batches_relationships() {
        let backend = backend();
        let response = execute(
            &backend,
            Some(ALICE),
            r#"{
                households {
                    household(householdId: "h1") {
                        name
                        roommates { fullName }
                        expenses { title splits { amount profile { fullName } } }
                    }
                }
            }"#,
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);

        let household = &data(&response)["households"]["household"];
        assert_eq!(household["name"], "Maple St");
        assert_eq!(household["roommates"], json!([{ "fullName": "Alice" }, { "fullName": "Bob" }]));
        assert_eq!(household["expenses"][0]["title"], "Groceries");
        assert_eq!(
            household["expenses"][0]["splits"][1]["profile"]["fullName"],
            "Bob"
        );

        let households = backend.requests_to("households").await;
        assert_eq!(households.len(), 1);
        assert_eq!(
            households[0].action,
            Action::Select {
                columns: "id,name".to_string()
            }
        );
        assert_eq!(backend.requests_to("roommates").await.len(), 1);
        assert_eq!(backend.requests_to("expenses").await.len(), 1);
        assert_eq!(backend.requests_to("expense_splits").await.len(), 1);
        assert!(backend.requests_to("profiles").await.len() <= 2);
    }

    #[tokio::test]
    async fn test_sibling_households_share_one_roommate_batch() {
        let backend = backend();
        let response = execute(
            &backend,
            None,
            "{ households { list { name roommates { fullName } } } }",
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);

        let list = &data(&response)["households"]["list"];
        assert_eq!(list[1]["roommates"], json!([{ "fullName": "Carol" }]));
        assert_eq!(backend.requests_to("roommates").await.len(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_caller() {
        let backend = backend();

        let response = execute(&backend, None, "{ households { myHouseholds { id } } }").await;
        assert_eq!(data(&response)["households"]["myHouseholds"], json!([]));

        let response = execute(
            &backend,
            None,
            r#"mutation { households { createHousehold(input: { name: "Nope" }) { id } } }"#,
        )
        .await;
        assert_eq!(first_error(&response), Some("Not authenticated"));
        assert!(backend.rows("households").await.len() == 2);
    }

    #[tokio::test]
    async fn test_create_household_makes_creator_a_member() {
        let backend = backend();
        let response = execute(
            &backend,
            Some(BOB),
            r#"mutation { households { createHousehold(input: { name: "Birch Rd" }) { id name currency inviteCode } } }"#,
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);

        let created = &data(&response)["households"]["createHousehold"];
        assert_eq!(created["currency"], "USD");
        assert_eq!(created["inviteCode"].as_str().map(str::len), Some(8));

        let id = created["id"].as_str().unwrap_or_default();
        let members = rows_where(&backend, "roommates", "household_id", id).await;
        assert_eq!(members.len(), 1);
        assert_eq!(members[0]["user_id"], json!(BOB.to_string()));
        assert_eq!(members[0]["status"], "accepted");
    }

    #[tokio::test]
    async fn test_join_leave_and_rejoin() {
        let backend = backend();
        let join = r#"mutation { households { joinHousehold(inviteCode: " maple123 ") { name } } }"#;

        let response = execute(&backend, Some(CAROL), join).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(data(&response)["households"]["joinHousehold"]["name"], "Maple St");

        let response = execute(&backend, Some(CAROL), join).await;
        assert_eq!(first_error(&response), Some("Already a member of this household"));

        let response = execute(
            &backend,
            Some(CAROL),
            r#"mutation { households { leaveHousehold(householdId: "h1") { success remainingHouseholds { name } } } }"#,
        )
        .await;
        assert_eq!(
            data(&response)["households"]["leaveHousehold"],
            json!({ "success": true, "remainingHouseholds": [{ "name": "Oak Ave" }] })
        );

        let response = execute(&backend, Some(CAROL), join).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        let memberships: Vec<_> = rows_where(&backend, "roommates", "household_id", "h1")
            .await
            .into_iter()
            .filter(|row| row["user_id"] == json!(CAROL.to_string()))
            .collect();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0]["status"], "accepted");

        let response = execute(
            &backend,
            Some(CAROL),
            r#"mutation { households { joinHousehold(inviteCode: "NOPE0000") { name } } }"#,
        )
        .await;
        assert_eq!(first_error(&response), Some("Invalid invite code"));
    }

    #[tokio::test]
    async fn test_membership_changes_are_visible_later_in_the_same_request() {
        let backend = backend();
        let response = execute(
            &backend,
            Some(CAROL),
            r#"mutation {
                joined: households { joinHousehold(inviteCode: "MAPLE123") { roommates { fullName households { name } } } }
                left: households { leaveHousehold(householdId: "h1") { success } }
                after: profiles { updateProfile(input: { bio: "moving out" }) { households { name } } }
            }"#,
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);

        let data = data(&response);
        let roommates = data["joined"]["joinHousehold"]["roommates"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        assert_eq!(roommates.len(), 3);
        assert_eq!(
            data["after"]["updateProfile"]["households"],
            json!([{ "name": "Oak Ave" }])
        );
    }

    #[tokio::test]
    async fn test_only_creator_updates_household() {
        let backend = backend();
        let update = r#"mutation { households { updateHousehold(householdId: "h1", input: { name: "Maple Street" }) { name } } }"#;

        let response = execute(&backend, Some(BOB), update).await;
        assert_eq!(first_error(&response), Some("Not authorized to update this household"));

        let response = execute(&backend, Some(ALICE), update).await;
        assert_eq!(
            data(&response)["households"]["updateHousehold"]["name"],
            "Maple Street"
        );
    }

    #[tokio::test]
    async fn test_create_expense_splits_equally() {
        let backend = backend();
        let query = format!(
            r#"mutation {{ expenses {{ createExpense(input: {{ householdId: "h1", title: "Rent", amount: 90, splitWith: ["{}", "{}"] }}) {{ id title paidBy currency }} }} }}"#,
            ALICE, BOB
        );
        let response = execute(&backend, Some(ALICE), &query).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);

        let created = &data(&response)["expenses"]["createExpense"];
        assert_eq!(created["paidBy"], json!(ALICE.to_string()));
        assert_eq!(created["currency"], "USD");

        let id = created["id"].as_str().unwrap_or_default();
        let splits = rows_where(&backend, "expense_splits", "expense_id", id).await;
        assert_eq!(splits.len(), 2);
        for split in &splits {
            assert_eq!(split["amount"], json!(45.0));
            let is_creator = split["user_id"] == json!(ALICE.to_string());
            assert_eq!(split["is_paid"], json!(is_creator));
        }

        let response = execute(&backend, Some(CAROL), &query).await;
        assert_eq!(first_error(&response), Some("Not a member of this household"));
    }

    #[tokio::test]
    async fn test_my_expenses_follow_splits() {
        let backend = backend();
        let response = execute(&backend, Some(BOB), "{ expenses { myExpenses { title } } }").await;
        assert_eq!(
            data(&response)["expenses"]["myExpenses"],
            json!([{ "title": "Internet" }, { "title": "Groceries" }])
        );
    }

    #[tokio::test]
    async fn test_mark_expense_paid_by_split_owner_only() {
        let backend = backend();
        let mark = r#"mutation { expenses { markExpensePaid(input: { expenseSplitId: "s2" }) } }"#;

        let response = execute(&backend, Some(ALICE), mark).await;
        assert!(first_error(&response).is_some());

        let response = execute(&backend, Some(BOB), mark).await;
        assert_eq!(data(&response)["expenses"]["markExpensePaid"], json!(true));
        let split = rows_where(&backend, "expense_splits", "id", "s2").await;
        assert_eq!(split[0]["is_paid"], json!(true));
        assert!(split[0]["paid_at"].is_string());
    }

    #[tokio::test]
    async fn test_generate_payment_url() {
        let backend = backend();
        let response = execute(
            &backend,
            Some(BOB),
            r#"mutation { expenses { generatePaymentUrl(input: { expenseSplitId: "s2" }) { paymentUrl paymentMethod availableMethods } } }"#,
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            data(&response)["expenses"]["generatePaymentUrl"],
            json!({
                "paymentUrl": "venmo://paycharge?recipients=alice&txn=pay&amount=30.00&note=Groceries+-+Weekly+shop",
                "paymentMethod": "venmo",
                "availableMethods": ["venmo"],
            })
        );
        let split = rows_where(&backend, "expense_splits", "id", "s2").await;
        assert_eq!(split[0]["payment_method"], "venmo");

        let response = execute(
            &backend,
            Some(BOB),
            r#"mutation { expenses { generatePaymentUrl(input: { expenseSplitId: "s2", paymentMethod: "zelle" }) { paymentUrl } } }"#,
        )
        .await;
        assert_eq!(
            first_error(&response),
            Some("Payment method 'zelle' not available for this user. Available: venmo")
        );

        let response = execute(
            &backend,
            Some(ALICE),
            r#"mutation { expenses { generatePaymentUrl(input: { expenseSplitId: "s2" }) { paymentUrl } } }"#,
        )
        .await;
        assert_eq!(
            first_error(&response),
            Some("Not authorized to generate payment URL for this split")
        );
    }

    #[tokio::test]
    async fn test_household_messages_oldest_first() {
        let backend = backend();
        let response = execute(
            &backend,
            Some(ALICE),
            r#"{ messages { householdMessages(householdId: "h1", limit: 2) { content metadata parsedMetadata sender { fullName } } } }"#,
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            data(&response)["messages"]["householdMessages"],
            json!([
                { "content": "Hey", "metadata": null, "parsedMetadata": null, "sender": { "fullName": "Bob" } },
                { "content": "Rent is due", "metadata": "{\"expense_id\":\"e1\"}", "parsedMetadata": "{\"expense_id\":\"e1\"}", "sender": { "fullName": "Alice" } },
            ])
        );
    }

    #[tokio::test]
    async fn test_send_message_stores_json_metadata() {
        let backend = backend();
        let response = execute(
            &backend,
            Some(BOB),
            r#"mutation { messages { sendMessage(input: { householdId: "h1", content: "Paid", metadata: "{\"split\": \"s2\"}" }) { messageType parsedMetadata } } }"#,
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            data(&response)["messages"]["sendMessage"],
            json!({ "messageType": "text", "parsedMetadata": "{\"split\":\"s2\"}" })
        );

        let stored = rows_where(&backend, "messages", "content", "Paid").await;
        assert_eq!(stored[0]["metadata"], json!({ "split": "s2" }));
    }

    #[tokio::test]
    async fn test_notifications() {
        let backend = backend();
        let response = execute(
            &backend,
            Some(ALICE),
            "{ notifications { myNotifications(unreadOnly: true) { id type } } }",
        )
        .await;
        assert_eq!(
            data(&response)["notifications"]["myNotifications"],
            json!([{ "id": "n1", "type": "expense" }])
        );

        let response = execute(
            &backend,
            Some(BOB),
            r#"mutation { notifications { markNotificationRead(input: { notificationId: "n1" }) } }"#,
        )
        .await;
        assert_eq!(first_error(&response), Some("Not authorized"));

        execute(
            &backend,
            Some(ALICE),
            "mutation { notifications { markAllNotificationsRead } }",
        )
        .await;
        let mine = rows_where(&backend, "notifications", "user_id", &ALICE.to_string()).await;
        assert!(mine.iter().all(|row| row["is_read"] == json!(true)));
        let bobs = rows_where(&backend, "notifications", "user_id", &BOB.to_string()).await;
        assert_eq!(bobs[0]["is_read"], json!(false));
    }

    #[tokio::test]
    async fn test_complete_chore_assignment_calls_procedure() {
        let backend = backend();
        let response = execute(
            &backend,
            Some(BOB),
            r#"mutation { chores { completeChoreAssignment(input: { assignmentId: "a1", proofUrl: "https://img/1" }) { isComplete proofUrl chore { title } user { fullName } } } }"#,
        )
        .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            data(&response)["chores"]["completeChoreAssignment"],
            json!({ "isComplete": true, "proofUrl": "https://img/1", "chore": { "title": "Dishes" }, "user": { "fullName": "Bob" } })
        );

        let calls = backend.requests_to("complete_chore_and_award_points").await;
        assert_eq!(
            calls[0].action,
            Action::Rpc {
                params: json!({ "p_assignment_id": "a1", "p_user_id": BOB.to_string(), "p_proof_url": "https://img/1" })
            }
        );
    }

    #[tokio::test]
    async fn test_chore_assignment_requires_member_assignee() {
        let backend = backend();
        let query = format!(
            r#"mutation {{ chores {{ createChoreAssignment(input: {{ choreId: "c1", userId: "{}", dueDate: "2024-03-20" }}) {{ id }} }} }}"#,
            CAROL
        );
        let response = execute(&backend, Some(ALICE), &query).await;
        assert_eq!(
            first_error(&response),
            Some("Assigned user is not a member of this household")
        );

        let response = execute(
            &backend,
            Some(ALICE),
            r#"{ chores { householdChoreAssignments(householdId: "h1") { id user { fullName } } } }"#,
        )
        .await;
        assert_eq!(
            data(&response)["chores"]["householdChoreAssignments"],
            json!([{ "id": "a1", "user": { "fullName": "Bob" } }])
        );
    }

    #[tokio::test]
    async fn test_update_profile_rejects_unknown_method() {
        let backend = backend();
        let response = execute(
            &backend,
            Some(ALICE),
            r#"mutation { profiles { updateProfile(input: { preferredPaymentMethod: "bitcoin" }) { id } } }"#,
        )
        .await;
        assert_eq!(first_error(&response), Some("Unknown payment method 'bitcoin'"));

        let response = execute(
            &backend,
            Some(ALICE),
            r#"mutation { profiles { updateProfile(input: { preferredPaymentMethod: "Zelle", bio: "hi" }) { preferredPaymentMethod bio } } }"#,
        )
        .await;
        assert_eq!(
            data(&response)["profiles"]["updateProfile"],
            json!({ "preferredPaymentMethod": "zelle", "bio": "hi" })
        );
    }

    #[tokio::test]
    async fn test_row_store_failure_surfaces_as_field_error() {
        let backend = backend();
        break_table(&backend, "roommates").await;

        let response = execute(
            &backend,
            None,
            r#"{ households { household(householdId: "h1") { name roommates { id } } } }"#,
        )
        .await;
        assert_eq!(
            first_error(&response),
            Some("row store request failed: connection refused")
        );
        assert_eq!(
            data(&response)["households"]["household"],
            json!({ "name": "Maple St", "roommates": null })
        );
    }
}
