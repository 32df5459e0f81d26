mod common;

use chrono::{Duration, Utc};
use common::{decimal, TestApp, TEST_RATE};
use rust_decimal::Decimal;
use serde_json::{json, Value};

#[tokio::test]
async fn dashboard_summarizes_activity() {
    let app = TestApp::spawn().await;

    app.post_data("/organizations", json!({ "name": "Colegio Central" }), 201)
        .await;
    let client_id = app.create_client("Ursula Brenes", None).await;
    let usd = app.create_purchase(&client_id, 100.0, "USD").await;
    let crc = app.create_purchase(&client_id, 50000.0, "CRC").await;

    app.record_payment(&usd, 40.0).await;
    app.record_payment(&crc, 10000.0).await;
    app.post_data(
        &format!("/purchases/{}/payments", usd),
        json!({ "amount": 20, "status": "pending", "due_date": "2099-06-01" }),
        201,
    )
    .await;

    let dashboard = app.get_data("/dashboard").await;
    assert_eq!(dashboard["organizations"], 1);
    assert_eq!(dashboard["clients"], 1);
    assert_eq!(dashboard["debtors"], 0);
    assert_eq!(dashboard["overdue_payments"], 0);
    assert_eq!(dashboard["reporting_currency"], "USD");

    let collected = dashboard["collected_this_month"].as_array().unwrap();
    assert_eq!(collected.len(), 2);

    // 40 USD + 10000 CRC at 500 CRC per USD
    assert_eq!(
        decimal(&dashboard["collected_this_month_total"]),
        Decimal::from(60)
    );

    let outstanding = dashboard["scheduled_outstanding"].as_array().unwrap();
    assert_eq!(outstanding.len(), 1);
    assert_eq!(outstanding[0]["currency"], "USD");
    assert_eq!(decimal(&outstanding[0]["amount"]), Decimal::from(20));

    let statuses = dashboard["purchases_by_status"].as_array().unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0]["status"], "partial");
    assert_eq!(statuses[0]["count"], 2);

    app.cleanup().await;
}

#[tokio::test]
async fn payments_report_groups_by_method_and_currency() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Victor Araya", None).await;
    let purchase_id = app.create_purchase(&client_id, 500.0, "USD").await;

    for (amount, method) in [(50, "cash"), (25, "cash"), (100, "card")] {
        app.post_data(
            &format!("/purchases/{}/payments", purchase_id),
            json!({ "amount": amount, "method": method }),
            201,
        )
        .await;
    }

    // Outside the report window
    let old = (Utc::now() - Duration::days(60)).to_rfc3339();
    app.post_data(
        &format!("/purchases/{}/payments", purchase_id),
        json!({ "amount": 10, "method": "cash", "paid_utc": old }),
        201,
    )
    .await;

    let today = Utc::now().date_naive();
    let from = today - Duration::days(1);
    let report = app
        .get_data(&format!("/reports/payments?from={}&to={}", from, today))
        .await;

    let rows = report["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["method"], "card");
    assert_eq!(rows[0]["payment_count"], 1);
    assert_eq!(rows[1]["method"], "cash");
    assert_eq!(rows[1]["payment_count"], 2);
    assert_eq!(decimal(&rows[1]["total"]), Decimal::from(75));

    let totals = report["totals"].as_array().unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(decimal(&totals[0]["amount"]), Decimal::from(175));

    app.cleanup().await;
}

#[tokio::test]
async fn payments_report_rejects_inverted_range() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/reports/payments?from=2026-02-01&to=2026-01-01")
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    app.cleanup().await;
}

#[tokio::test]
async fn exchange_rate_comes_from_the_api() {
    let app = TestApp::spawn().await;

    let rate = app.get_data("/exchange-rate").await;
    assert_eq!(rate["base"], "USD");
    assert_eq!(rate["quote"], "CRC");
    assert_eq!(decimal(&rate["rate"]), Decimal::from(TEST_RATE));
    assert_eq!(rate["source"], "live");

    let rate = app.get_data("/exchange-rate").await;
    assert_eq!(rate["source"], "cached");

    app.cleanup().await;
}
