//! Registration, token and logout flows.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::json;

use stitch_integration_tests::{PASSWORD, TestContext};

#[tokio::test]
async fn test_register_creates_profile_and_cart() {
    let ctx = TestContext::new().await;
    let reply = ctx
        .post(
            "/api/auth/register/",
            None,
            json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": PASSWORD,
                "first_name": "Alice",
                "phone": "09171234567",
            }),
        )
        .await;

    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["username"], "alice");
    assert_eq!(reply.body["is_staff"], false);
    assert_eq!(reply.body["profile"]["first_name"], "Alice");
    assert_eq!(reply.body["profile"]["role"], "user");
    assert!(reply.body["cart"]["cart_id"].is_i64());
    assert_eq!(reply.body["address"], json!([]));
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let ctx = TestContext::new().await;
    ctx.customer("alice").await;

    let duplicate = ctx
        .post(
            "/api/auth/register/",
            None,
            json!({"username": "alice", "email": "other@example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);

    let weak = ctx
        .post(
            "/api/auth/register/",
            None,
            json!({"username": "bob", "email": "bob@example.com", "password": "short"}),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);

    let bad_email = ctx
        .post(
            "/api/auth/register/",
            None,
            json!({"username": "carol", "email": "not-an-email", "password": PASSWORD}),
        )
        .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);

    let not_json = ctx
        .post("/api/auth/register/", None, json!(["alice"]))
        .await;
    assert_eq!(not_json.status, StatusCode::BAD_REQUEST);
    assert!(not_json.body["detail"].is_string());
}

#[tokio::test]
async fn test_login_and_me() {
    let ctx = TestContext::new().await;
    let alice = ctx.customer("alice").await;

    let wrong = ctx
        .post(
            "/api/auth/token/",
            None,
            json!({"username": "alice", "password": "not-the-password"}),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let me = ctx.get("/api/auth/me/", Some(&alice)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["id"], alice.id);
    assert_eq!(me.body["email"], "alice@example.com");

    let protected = ctx.get("/api/protected/", Some(&alice)).await;
    assert_eq!(protected.status, StatusCode::OK);
    assert_eq!(protected.body["user_id"], alice.id);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let ctx = TestContext::new().await;

    let anonymous = ctx.get("/api/auth/me/", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        anonymous.body["detail"],
        "Authentication credentials were not provided."
    );

    let forged = ctx
        .client
        .get(ctx.url("/api/auth/me/"))
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_then_logout_revokes() {
    let ctx = TestContext::new().await;
    let alice = ctx.customer("alice").await;

    let refreshed = ctx
        .post(
            "/api/auth/token/refresh/",
            None,
            json!({"refresh": alice.refresh}),
        )
        .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert!(refreshed.body["access"].is_string());

    // An access token is not a refresh token.
    let swapped = ctx
        .post(
            "/api/auth/token/refresh/",
            None,
            json!({"refresh": alice.access}),
        )
        .await;
    assert_eq!(swapped.status, StatusCode::UNAUTHORIZED);

    let logout = ctx
        .post(
            "/api/auth/logout/",
            Some(&alice),
            json!({"refresh": alice.refresh}),
        )
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.body["detail"], "Successfully logged out.");

    let again = ctx
        .post(
            "/api/auth/logout/",
            Some(&alice),
            json!({"refresh": alice.refresh}),
        )
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.body["detail"], "Invalid token or already logged out.");

    let revoked = ctx
        .post(
            "/api/auth/token/refresh/",
            None,
            json!({"refresh": alice.refresh}),
        )
        .await;
    assert_eq!(revoked.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_and_unknown_routes() {
    let ctx = TestContext::new().await;

    let health = ctx.client.get(ctx.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert!(health.headers().contains_key("x-request-id"));

    let ready = ctx.get("/health/ready", None).await;
    assert_eq!(ready.status, StatusCode::OK);

    let missing = ctx.get("/api/nothing-here/", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["detail"], "Not found.");
}

#[tokio::test]
async fn test_deleted_account_token_stops_working() {
    let ctx = TestContext::new().await;
    let alice = ctx.customer("alice").await;

    let closed = ctx
        .delete(&format!("/api/appusers/{}/", alice.id), Some(&alice))
        .await;
    assert_eq!(closed.status, StatusCode::NO_CONTENT);

    // The access token is still unexpired and correctly signed.
    let me = ctx.get("/api/auth/me/", Some(&alice)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    assert_eq!(me.body["detail"], "User not found");

    let refreshed = ctx
        .post(
            "/api/auth/token/refresh/",
            None,
            json!({"refresh": alice.refresh}),
        )
        .await;
    assert_eq!(refreshed.status, StatusCode::UNAUTHORIZED);
}
