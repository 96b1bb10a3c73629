//! Cross-account access and staff-only routes.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use stitch_integration_tests::{Session, TestContext, id};

/// Ids of everything bob owns after placing one order.
struct BobsThings {
    address: i64,
    cart: i64,
    cart_item: i64,
    order: i64,
    order_item: i64,
}

async fn bob_shops(ctx: &TestContext, staff: &Session, bob: &Session) -> BobsThings {
    let product = id(&ctx.product(staff, "Lace", "3.00", None).await, "product_id");
    let address = id(&ctx.address(bob).await, "address_id");

    let line = ctx
        .post(
            "/api/cartitems/",
            Some(bob),
            json!({"product": product, "quantity": 1}),
        )
        .await;
    let carts = ctx.get("/api/shoppingcarts/", Some(bob)).await;
    let order = ctx
        .post(
            "/api/orders/",
            Some(bob),
            json!({
                "shipping_address": address,
                "billing_address": address,
                "items": [{"product": product, "quantity": 4}],
            }),
        )
        .await;
    assert_eq!(order.status, StatusCode::CREATED, "{:?}", order.body);

    BobsThings {
        address,
        cart: id(&carts.body["results"][0], "cart_id"),
        cart_item: id(&line.body, "cart_item_id"),
        order: id(&order.body, "order_id"),
        order_item: id(&order.body["items"][0], "order_item_id"),
    }
}

fn paths(bob: &Session, things: &BobsThings) -> Vec<String> {
    vec![
        format!("/api/appusers/{}/", bob.id),
        format!("/api/addresses/{}/", things.address),
        format!("/api/shoppingcarts/{}/", things.cart),
        format!("/api/cartitems/{}/", things.cart_item),
        format!("/api/orders/{}/", things.order),
        format!("/api/orderitems/{}/", things.order_item),
    ]
}

#[tokio::test]
async fn test_customers_cannot_touch_each_others_objects() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    let alice = ctx.customer("alice").await;
    let bob = ctx.customer("bob").await;
    let things = bob_shops(&ctx, &staff, &bob).await;

    for path in paths(&bob, &things) {
        let read = ctx.get(&path, Some(&alice)).await;
        assert_eq!(read.status, StatusCode::FORBIDDEN, "GET {path}");
        assert_eq!(
            read.body["detail"],
            "You do not have permission to perform this action."
        );

        assert_eq!(ctx.get(&path, Some(&bob)).await.status, StatusCode::OK, "GET {path}");
        assert_eq!(ctx.get(&path, Some(&staff)).await.status, StatusCode::OK, "GET {path}");
    }

    let delete = ctx
        .delete(&format!("/api/addresses/{}/", things.address), Some(&alice))
        .await;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);

    let cancel = ctx
        .patch(
            &format!("/api/orders/{}/", things.order),
            Some(&alice),
            json!({"order_status": "Cancelled"}),
        )
        .await;
    assert_eq!(cancel.status, StatusCode::FORBIDDEN);

    let requantify = ctx
        .patch(
            &format!("/api/cartitems/{}/", things.cart_item),
            Some(&alice),
            json!({"quantity": 9}),
        )
        .await;
    assert_eq!(requantify.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_lists_only_show_own_objects() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    let alice = ctx.customer("alice").await;
    let bob = ctx.customer("bob").await;
    bob_shops(&ctx, &staff, &bob).await;

    for path in [
        "/api/orders/",
        "/api/orderitems/",
        "/api/addresses/",
        "/api/cartitems/",
    ] {
        let alices = ctx.get(path, Some(&alice)).await;
        assert_eq!(alices.status, StatusCode::OK, "GET {path}");
        assert_eq!(alices.body["count"], 0, "GET {path}");

        let bobs = ctx.get(path, Some(&bob)).await;
        assert_eq!(bobs.body["count"], 1, "GET {path}");
    }

    let carts = ctx.get("/api/shoppingcarts/", Some(&alice)).await;
    assert_eq!(carts.body["count"], 1);
    assert_eq!(carts.body["results"][0]["user"], alice.id);
}

#[tokio::test]
async fn test_payments_and_profiles_list_are_staff_only() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    let alice = ctx.customer("alice").await;
    let bob = ctx.customer("bob").await;
    let things = bob_shops(&ctx, &staff, &bob).await;

    let paid = ctx
        .post("/api/payments/", Some(&staff), json!({"order": things.order}))
        .await;
    assert_eq!(paid.status, StatusCode::CREATED);
    let payment_path = format!("/api/payments/{}/", id(&paid.body, "payment_id"));

    for path in ["/api/payments/", "/api/appusers/", payment_path.as_str()] {
        assert_eq!(
            ctx.get(path, Some(&alice)).await.status,
            StatusCode::FORBIDDEN,
            "GET {path}"
        );
        // Owning the order does not make its payment readable.
        assert_eq!(
            ctx.get(path, Some(&bob)).await.status,
            StatusCode::FORBIDDEN,
            "GET {path}"
        );
        assert_eq!(
            ctx.get(path, Some(&staff)).await.status,
            StatusCode::OK,
            "GET {path}"
        );
    }

    let own_payment = ctx
        .post("/api/payments/", Some(&bob), json!({"order": things.order}))
        .await;
    assert_eq!(own_payment.status, StatusCode::FORBIDDEN);

    // Bob still sees the payment through his order.
    let order = ctx
        .get(&format!("/api/orders/{}/", things.order), Some(&bob))
        .await;
    assert_eq!(order.body["payment_details"]["order"], things.order);

    let profiles = ctx.get("/api/appusers/?search=bob", Some(&staff)).await;
    assert_eq!(profiles.body["count"], 1);
    assert_eq!(profiles.body["results"][0]["user_id"], bob.id);
}

#[tokio::test]
async fn test_unknown_objects_are_not_found() {
    let ctx = TestContext::new().await;
    let alice = ctx.customer("alice").await;

    let order = ctx.get("/api/orders/999/", Some(&alice)).await;
    assert_eq!(order.status, StatusCode::NOT_FOUND);
    assert_eq!(order.body["detail"], "No Orders matches the given query.");

    let address = ctx.get("/api/addresses/999/", Some(&alice)).await;
    assert_eq!(address.status, StatusCode::NOT_FOUND);

    let anonymous: Value = ctx.get("/api/orders/", None).await.body;
    assert_eq!(
        anonymous["detail"],
        "Authentication credentials were not provided."
    );
}
