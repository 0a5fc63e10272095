//! Integration tests for registration, login, and route protection.

mod common;

use common::TestApp;
use serde_json::{json, Value};

#[tokio::test]
async fn register_creates_user() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/auth/register",
            None,
            &json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "ada@example.com",
                "password": "password123",
            }),
        )
        .await;

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "User created");
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert_eq!(body["data"]["first_name"], "Ada");
    assert!(body["data"]["id"].as_str().is_some());
    // The password hash must never appear on the wire.
    assert!(body["data"].get("password").is_none());
    common::parse_ts(body["data"]["created_at"].as_str().unwrap());

    app.cleanup().await;
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = TestApp::spawn().await;
    app.register_and_login("dup@example.com").await;

    let response = app
        .post(
            "/auth/register",
            None,
            &json!({
                "first_name": "Other",
                "last_name": "Person",
                "email": "dup@example.com",
                "password": "password123",
            }),
        )
        .await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "User with this email already exists");

    app.cleanup().await;
}

#[tokio::test]
async fn register_normalizes_email() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/auth/register",
            None,
            &json!({
                "first_name": "Case",
                "last_name": "Insensitive",
                "email": "  Mixed.Case@Example.COM ",
                "password": "password123",
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["email"], "mixed.case@example.com");

    // Login succeeds against the normalized form.
    let response = app
        .post(
            "/auth/login",
            None,
            &json!({ "email": "mixed.case@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(response.status(), 200);

    app.cleanup().await;
}

#[tokio::test]
async fn register_rejects_short_password() {
    let app = TestApp::spawn().await;

    let response = app
        .post(
            "/auth/register",
            None,
            &json!({
                "first_name": "Short",
                "last_name": "Pass",
                "email": "short@example.com",
                "password": "abc",
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = TestApp::spawn().await;
    app.register_and_login("creds@example.com").await;

    // Wrong password.
    let response = app
        .post(
            "/auth/login",
            None,
            &json!({ "email": "creds@example.com", "password": "wrongpassword" }),
        )
        .await;
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid email or password");

    // Unknown email gets the same message, no account probing.
    let response = app
        .post(
            "/auth/login",
            None,
            &json!({ "email": "nobody@example.com", "password": "wrongpassword" }),
        )
        .await;
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid email or password");

    app.cleanup().await;
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = TestApp::spawn().await;

    let response = app.get("/plan", None).await;
    assert_eq!(response.status(), 401);

    let response = app.get("/subscription", Some("not-a-valid-token")).await;
    assert_eq!(response.status(), 401);

    let response = app
        .post("/subscription", None, &json!({ "price_id": "x" }))
        .await;
    assert_eq!(response.status(), 401);

    app.cleanup().await;
}
