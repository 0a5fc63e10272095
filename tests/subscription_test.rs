//! Integration tests for subscription creation, cancellation, and listing.

mod common;

use chrono::Months;
use common::{first_price_id, plan_id, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn create_subscription_opens_calendar_period() {
    let app = TestApp::spawn().await;
    let (user_id, token) = app.register_and_login("subscribe@example.com").await;

    let plan = app.create_plan(&token, "Basic", "month", 1, 1000).await;
    let price_id = first_price_id(&plan);

    let response = app
        .post(
            "/subscription",
            Some(&token),
            &json!({ "price_id": price_id }),
        )
        .await;

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Subscription created");

    let sub = &body["data"];
    assert_eq!(sub["user_id"], json!(user_id));
    assert_eq!(sub["plan_id"], json!(plan_id(&plan)));
    assert_eq!(sub["status"], "active");
    assert_eq!(sub["interval"], "month");
    assert_eq!(sub["amount_paid"], 1000);
    assert!(sub["upgraded_from_subscription_id"].is_null());
    assert!(sub["canceled_at"].is_null());
    assert!(sub["ended_at"].is_null());

    // Month arithmetic is calendar-aware, not a fixed number of days.
    let start = common::parse_ts(sub["current_period_start"].as_str().unwrap());
    let end = common::parse_ts(sub["current_period_end"].as_str().unwrap());
    assert_eq!(end, start.checked_add_months(Months::new(1)).unwrap());

    app.cleanup().await;
}

#[tokio::test]
async fn create_subscription_rejects_unknown_price() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register_and_login("noprice@example.com").await;

    let response = app
        .post(
            "/subscription",
            Some(&token),
            &json!({ "price_id": uuid::Uuid::new_v4() }),
        )
        .await;

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "the price id was not found");

    app.cleanup().await;
}

#[tokio::test]
async fn duplicate_active_subscription_rejected() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register_and_login("onlyone@example.com").await;

    let plan = app.create_plan(&token, "Basic", "month", 1, 1000).await;
    let price_id = first_price_id(&plan);

    let response = app
        .post(
            "/subscription",
            Some(&token),
            &json!({ "price_id": price_id }),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .post(
            "/subscription",
            Some(&token),
            &json!({ "price_id": price_id }),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "You have an active subscription with this plan");

    app.cleanup().await;
}

#[tokio::test]
async fn cancel_marks_subscription_but_keeps_it_active() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register_and_login("cancel@example.com").await;

    let plan = app.create_plan(&token, "Basic", "month", 1, 1000).await;
    let response = app
        .post(
            "/subscription",
            Some(&token),
            &json!({ "price_id": first_price_id(&plan) }),
        )
        .await;
    let body: Value = response.json().await.unwrap();
    let subscription_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .patch(
            "/subscription",
            Some(&token),
            &json!({ "subscription_id": subscription_id }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Successfully canceled subscription");
    // Cancellation stamps canceled_at without flipping the status.
    assert_eq!(body["subscription"]["status"], "active");
    assert!(body["subscription"]["canceled_at"].as_str().is_some());
    assert!(body["subscription"]["ended_at"].is_null());

    // A second cancel is rejected.
    let response = app
        .patch(
            "/subscription",
            Some(&token),
            &json!({ "subscription_id": subscription_id }),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "the subscription is not currently active");

    app.cleanup().await;
}

#[tokio::test]
async fn cancel_unknown_subscription_rejected() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register_and_login("cancelnone@example.com").await;

    let response = app
        .patch(
            "/subscription",
            Some(&token),
            &json!({ "subscription_id": uuid::Uuid::new_v4() }),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "the subscription is not currently active");

    app.cleanup().await;
}

#[tokio::test]
async fn list_subscriptions_applies_filters() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register_and_login("lister@example.com").await;

    let basic = app.create_plan(&token, "Basic", "month", 1, 1000).await;
    let premium = app.create_plan(&token, "Premium", "month", 1, 2000).await;

    for plan in [&basic, &premium] {
        let response = app
            .post(
                "/subscription",
                Some(&token),
                &json!({ "price_id": first_price_id(plan) }),
            )
            .await;
        assert_eq!(response.status(), 201);
    }

    let response = app.get("/subscription", Some(&token)).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Successfully retrieved subscription");
    assert_eq!(body["subscriptions"].as_array().unwrap().len(), 2);

    let response = app
        .get(
            &format!("/subscription?plan_id={}", plan_id(&basic)),
            Some(&token),
        )
        .await;
    let body: Value = response.json().await.unwrap();
    let subs = body["subscriptions"].as_array().unwrap().clone();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0]["plan_id"], json!(plan_id(&basic)));

    let response = app.get("/subscription?status=ended", Some(&token)).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["subscriptions"].as_array().unwrap().len(), 0);

    // Users only ever see their own ledger.
    let (_, other_token) = app.register_and_login("other-lister@example.com").await;
    let response = app.get("/subscription", Some(&other_token)).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["subscriptions"].as_array().unwrap().len(), 0);

    app.cleanup().await;
}
