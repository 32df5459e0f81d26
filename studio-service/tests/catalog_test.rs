mod common;

use common::{decimal, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};

async fn create_item(app: &TestApp, sku: &str, stock: i32) -> String {
    let item = app
        .post_data(
            "/inventory",
            json!({
                "sku": sku,
                "name": format!("Item {}", sku),
                "unit_price": 10,
                "currency": "USD",
                "stock_quantity": stock
            }),
            201,
        )
        .await;
    item["item_id"].as_str().unwrap().to_string()
}

async fn stock_of(app: &TestApp, item_id: &str) -> i64 {
    app.get_data(&format!("/inventory/{}", item_id)).await["stock_quantity"]
        .as_i64()
        .unwrap()
}

#[tokio::test]
async fn stock_adjustments_never_go_negative() {
    let app = TestApp::spawn().await;
    let item_id = create_item(&app, "PRINT-8x10", 5).await;

    let item = app
        .post_data(
            &format!("/inventory/{}/stock", item_id),
            json!({ "delta": 3, "reason": "restock" }),
            200,
        )
        .await;
    assert_eq!(item["stock_quantity"], 8);

    let response = app
        .post_json(
            &format!("/inventory/{}/stock", item_id),
            json!({ "delta": -9 }),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(stock_of(&app, &item_id).await, 8);

    app.cleanup().await;
}

#[tokio::test]
async fn bundle_sale_consumes_and_cancellation_restores_stock() {
    let app = TestApp::spawn().await;
    let prints = create_item(&app, "PRINT-5x7", 10).await;
    let frame = create_item(&app, "FRAME-S", 2).await;

    let bundle = app
        .post_data(
            "/bundles",
            json!({
                "name": "Graduation Pack",
                "price": 120,
                "currency": "USD",
                "items": [
                    { "item_id": prints, "quantity": 4 },
                    { "item_id": frame, "quantity": 1 }
                ]
            }),
            201,
        )
        .await;
    let bundle_id = bundle["bundle_id"].as_str().unwrap().to_string();
    assert_eq!(bundle["items"].as_array().unwrap().len(), 2);

    let client_id = app.create_client("Parent One", None).await;
    let purchase = app
        .post_data(
            "/purchases",
            json!({ "client_id": client_id, "bundle_id": bundle_id }),
            201,
        )
        .await;
    let purchase_id = purchase["purchase_id"].as_str().unwrap().to_string();

    // Total and currency come from the bundle
    assert_eq!(decimal(&purchase["total_amount"]), Decimal::from(120));
    assert_eq!(purchase["currency"], "USD");
    assert_eq!(purchase["status"], "pending");

    assert_eq!(stock_of(&app, &prints).await, 6);
    assert_eq!(stock_of(&app, &frame).await, 1);

    let cancelled = app
        .post_data(&format!("/purchases/{}/cancel", purchase_id), json!({}), 200)
        .await;
    assert_eq!(cancelled["status"], "cancelled");

    assert_eq!(stock_of(&app, &prints).await, 10);
    assert_eq!(stock_of(&app, &frame).await, 2);

    // A second cancel is a conflict
    let response = app
        .post_empty(&format!("/purchases/{}/cancel", purchase_id))
        .await;
    assert_eq!(response.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
async fn bundle_sale_fails_without_stock() {
    let app = TestApp::spawn().await;
    let frame = create_item(&app, "FRAME-L", 1).await;

    let bundle = app
        .post_data(
            "/bundles",
            json!({
                "name": "Family Wall",
                "price": 300,
                "currency": "USD",
                "items": [{ "item_id": frame, "quantity": 2 }]
            }),
            201,
        )
        .await;
    let bundle_id = bundle["bundle_id"].as_str().unwrap().to_string();
    let client_id = app.create_client("Parent Two", None).await;

    let response = app
        .post_json(
            "/purchases",
            json!({ "client_id": client_id, "bundle_id": bundle_id }),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Insufficient stock"));

    // Nothing was sold and nothing left the shelf
    let purchases = app
        .get_data(&format!("/purchases?client_id={}", client_id))
        .await;
    assert!(purchases.as_array().unwrap().is_empty());
    assert_eq!(stock_of(&app, &frame).await, 1);

    app.cleanup().await;
}

#[tokio::test]
async fn inactive_bundle_cannot_be_sold() {
    let app = TestApp::spawn().await;

    let bundle = app
        .post_data(
            "/bundles",
            json!({ "name": "Retired Pack", "price": 50, "currency": "USD" }),
            201,
        )
        .await;
    let bundle_id = bundle["bundle_id"].as_str().unwrap().to_string();
    app.post_data(&format!("/bundles/{}/deactivate", bundle_id), json!({}), 200)
        .await;

    let client_id = app.create_client("Late Buyer", None).await;
    let response = app
        .post_json(
            "/purchases",
            json!({ "client_id": client_id, "bundle_id": bundle_id }),
        )
        .await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn purchase_needs_a_total_without_bundle() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Walk In", None).await;

    let response = app
        .post_json(
            "/purchases",
            json!({ "client_id": client_id, "currency": "USD" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .post_json(
            "/purchases",
            json!({ "client_id": client_id, "currency": "USD", "total_amount": 0 }),
        )
        .await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}
