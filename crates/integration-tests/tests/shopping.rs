//! Catalog, cart, checkout and order flows over HTTP.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

use stitch_integration_tests::{TestContext, id, money};

#[tokio::test]
async fn test_alice_orders_two_of_a_product() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    let product = ctx.product(&staff, "Denim", "10.00", None).await;
    let product_id = id(&product, "product_id");

    let alice = ctx.customer("alice").await;
    let added = ctx
        .post(
            "/api/cartitems/",
            Some(&alice),
            json!({"product": product_id, "quantity": 2}),
        )
        .await;
    assert_eq!(added.status, StatusCode::CREATED);
    assert_eq!(added.body["quantity"], 2);

    let address = id(&ctx.address(&alice).await, "address_id");
    let order = ctx
        .post(
            "/api/orders/",
            Some(&alice),
            json!({
                "shipping_address": address,
                "billing_address": address,
                "items": [{"product": product_id, "quantity": 2}],
            }),
        )
        .await;
    assert_eq!(order.status, StatusCode::CREATED, "{:?}", order.body);

    let items = order.body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(money(&items[0]["subtotal"]), Decimal::new(2000, 2));
    assert_eq!(money(&order.body["total_amount"]), Decimal::new(2000, 2));
    assert_eq!(order.body["order_status"], "Pending");
    assert_eq!(order.body["user"], alice.id);
    assert!(order.body["payment_details"].is_null());
}

#[tokio::test]
async fn test_adding_same_product_merges_lines() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    let product_id = id(&ctx.product(&staff, "Linen", "10.50", None).await, "product_id");
    let alice = ctx.customer("alice").await;

    for quantity in [2, 3] {
        let reply = ctx
            .post(
                "/api/cartitems/",
                Some(&alice),
                json!({"product": product_id, "quantity": quantity}),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let lines = ctx.get("/api/cartitems/", Some(&alice)).await;
    assert_eq!(lines.body["count"], 1);
    assert_eq!(lines.body["results"][0]["quantity"], 5);

    // Setting the quantity to zero removes the line.
    let line_id = id(&lines.body["results"][0], "cart_item_id");
    let cleared = ctx
        .patch(
            &format!("/api/cartitems/{line_id}/"),
            Some(&alice),
            json!({"quantity": 0}),
        )
        .await;
    assert_eq!(cleared.status, StatusCode::NO_CONTENT);
    let lines = ctx.get("/api/cartitems/", Some(&alice)).await;
    assert_eq!(lines.body["count"], 0);
}

#[tokio::test]
async fn test_cart_rejects_bad_lines() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    let product_id = id(&ctx.product(&staff, "Fleece", "9.00", None).await, "product_id");
    let alice = ctx.customer("alice").await;

    let zero = ctx
        .post(
            "/api/cartitems/",
            Some(&alice),
            json!({"product": product_id, "quantity": 0}),
        )
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let unknown = ctx
        .post(
            "/api/cartitems/",
            Some(&alice),
            json!({"product": 9999, "quantity": 1}),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);

    // Registration already made a cart.
    let second_cart = ctx.post("/api/shoppingcarts/", Some(&alice), json!({})).await;
    assert_eq!(second_cart.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_empties_cart() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    let thread = id(&ctx.product(&staff, "Thread", "12.50", None).await, "product_id");
    let pins = id(&ctx.product(&staff, "Pins", "4.00", None).await, "product_id");
    let alice = ctx.customer("alice").await;
    let address = id(&ctx.address(&alice).await, "address_id");

    for (product, quantity) in [(thread, 2), (pins, 1)] {
        ctx.post(
            "/api/cartitems/",
            Some(&alice),
            json!({"product": product, "quantity": quantity}),
        )
        .await;
    }

    let order = ctx
        .post(
            "/api/orders/checkout/",
            Some(&alice),
            json!({"shipping_address": address, "billing_address": address}),
        )
        .await;
    assert_eq!(order.status, StatusCode::CREATED, "{:?}", order.body);
    assert_eq!(order.body["items"].as_array().unwrap().len(), 2);
    assert_eq!(money(&order.body["total_amount"]), Decimal::new(2900, 2));

    let lines = ctx.get("/api/cartitems/", Some(&alice)).await;
    assert_eq!(lines.body["count"], 0);

    let empty = ctx
        .post(
            "/api/orders/checkout/",
            Some(&alice),
            json!({"shipping_address": address, "billing_address": address}),
        )
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_price_is_a_snapshot() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    let product_id = id(&ctx.product(&staff, "Silk Blend", "10.00", None).await, "product_id");
    let alice = ctx.customer("alice").await;
    let address = id(&ctx.address(&alice).await, "address_id");

    let order = ctx
        .post(
            "/api/orders/",
            Some(&alice),
            json!({
                "shipping_address": address,
                "billing_address": address,
                "items": [{"product": product_id, "quantity": 1}],
            }),
        )
        .await;
    let order_id = id(&order.body, "order_id");

    let repriced = ctx
        .patch(
            &format!("/api/products/{product_id}/"),
            Some(&staff),
            json!({"price": "20.00"}),
        )
        .await;
    assert_eq!(repriced.status, StatusCode::OK);
    assert_eq!(money(&repriced.body["price"]), Decimal::new(2000, 2));

    let items = ctx
        .get(&format!("/api/orderitems/?order_id={order_id}"), Some(&alice))
        .await;
    assert_eq!(items.body["count"], 1);
    assert_eq!(
        money(&items.body["results"][0]["price_at_time_of_order"]),
        Decimal::new(1000, 2)
    );

    let order = ctx
        .get(&format!("/api/orders/{order_id}/"), Some(&alice))
        .await;
    assert_eq!(money(&order.body["total_amount"]), Decimal::new(1000, 2));
}

#[tokio::test]
async fn test_order_status_and_payment_lifecycle() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    let product_id = id(&ctx.product(&staff, "Zippers", "7.00", None).await, "product_id");
    let alice = ctx.customer("alice").await;
    let address = id(&ctx.address(&alice).await, "address_id");
    let order = ctx
        .post(
            "/api/orders/",
            Some(&alice),
            json!({
                "shipping_address": address,
                "billing_address": address,
                "items": [{"product": product_id, "quantity": 3}],
            }),
        )
        .await;
    let order_id = id(&order.body, "order_id");
    let order_path = format!("/api/orders/{order_id}/");

    let payment = ctx
        .post(
            "/api/payments/",
            Some(&staff),
            json!({"order": order_id, "payment_method": "GCash"}),
        )
        .await;
    assert_eq!(payment.status, StatusCode::CREATED, "{:?}", payment.body);
    assert_eq!(money(&payment.body["amount"]), Decimal::new(2100, 2));
    assert_eq!(payment.body["payment_status"], "Pending");

    let duplicate = ctx
        .post("/api/payments/", Some(&staff), json!({"order": order_id}))
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let payment_id = id(&payment.body, "payment_id");
    let completed = ctx
        .patch(
            &format!("/api/payments/{payment_id}/"),
            Some(&staff),
            json!({"payment_status": "Completed", "transaction_id": "GC-1001"}),
        )
        .await;
    assert_eq!(completed.status, StatusCode::OK);
    assert!(completed.body["paid_at"].is_string());

    let reopened = ctx
        .patch(
            &format!("/api/payments/{payment_id}/"),
            Some(&staff),
            json!({"payment_status": "Pending"}),
        )
        .await;
    assert_eq!(reopened.status, StatusCode::CONFLICT);

    for status in ["Processing", "Delivered"] {
        let reply = ctx
            .patch(&order_path, Some(&staff), json!({"order_status": status}))
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{:?}", reply.body);
    }

    let delivered = ctx.get(&order_path, Some(&alice)).await;
    assert_eq!(delivered.body["order_status"], "Delivered");
    assert!(delivered.body["delivery_date"].is_string());
    assert_eq!(delivered.body["payment_details"]["payment_status"], "Completed");

    let backwards = ctx
        .patch(&order_path, Some(&staff), json!({"order_status": "Pending"}))
        .await;
    assert_eq!(backwards.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_catalog_is_public_but_writes_need_staff() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    ctx.product(&staff, "Thimbles", "2.00", None).await;
    let alice = ctx.customer("alice").await;

    let listed = ctx.get("/api/products/", None).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["count"], 1);

    let anonymous = ctx
        .post("/api/products/", None, json!({"name": "Hoops", "price": "8.00"}))
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let customer = ctx
        .post(
            "/api/products/",
            Some(&alice),
            json!({"name": "Hoops", "price": "8.00"}),
        )
        .await;
    assert_eq!(customer.status, StatusCode::FORBIDDEN);

    let missing = ctx.get("/api/products/404/", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["detail"], "No Products matches the given query.");

    let not_an_id = ctx.get("/api/products/abc/", None).await;
    assert_eq!(not_an_id.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_category_keeps_its_products() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    let fabrics = id(&ctx.category(&staff, "Fabrics", None).await, "category_id");
    let cotton = ctx.category(&staff, "Cotton Blends", Some(fabrics)).await;
    assert_eq!(cotton["parent_category"], fabrics);
    let denim = id(
        &ctx.product(&staff, "Denim", "14.00", Some(fabrics)).await,
        "product_id",
    );

    let deleted = ctx
        .delete(&format!("/api/categories/{fabrics}/"), Some(&staff))
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let product = ctx.get(&format!("/api/products/{denim}/"), None).await;
    assert_eq!(product.status, StatusCode::OK);
    assert!(product.body["category"].is_null());

    let child = ctx
        .get(
            &format!("/api/categories/{}/", id(&cotton, "category_id")),
            None,
        )
        .await;
    assert!(child.body["parent_category"].is_null());
}

#[tokio::test]
async fn test_list_pagination_envelope() {
    let ctx = TestContext::new().await;
    let staff = ctx.staff("clerk").await;
    for (name, price) in [("Buttons", "9.50"), ("Velcro", "6.00"), ("Bias Tape", "4.75")] {
        ctx.product(&staff, name, price, None).await;
    }

    let first = ctx.get("/api/products/?page_size=2", None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["count"], 3);
    assert_eq!(first.body["total_pages"], 2);
    assert_eq!(first.body["results"].as_array().unwrap().len(), 2);
    assert!(first.body["previous"].is_null());
    let next = first.body["next"].as_str().unwrap();
    assert_eq!(next, ctx.url("/api/products/?page_size=2&page=2"));

    let second = ctx.client.get(next).send().await.unwrap();
    let second: serde_json::Value = second.json().await.unwrap();
    assert_eq!(second["results"].as_array().unwrap().len(), 1);
    assert!(second["next"].is_null());

    let past_end = ctx.get("/api/products/?page=3&page_size=2", None).await;
    assert_eq!(past_end.status, StatusCode::NOT_FOUND);
    assert_eq!(past_end.body["detail"], "Invalid page.");

    let filtered = ctx.get("/api/products/?search=velcro", None).await;
    assert_eq!(filtered.body["count"], 1);
}
