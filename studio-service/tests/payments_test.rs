mod common;

use common::{decimal, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};

#[tokio::test]
async fn partial_then_full_payment() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Carla Mora", None).await;
    let purchase_id = app.create_purchase(&client_id, 150.0, "USD").await;

    let recorded = app.record_payment(&purchase_id, 50.0).await;
    assert_eq!(recorded["payment"]["status"], "paid");
    assert_eq!(recorded["balance"]["status"], "partial");
    assert_eq!(decimal(&recorded["balance"]["remaining"]), Decimal::from(100));

    let recorded = app.record_payment(&purchase_id, 100.0).await;
    assert_eq!(recorded["balance"]["status"], "paid");
    assert_eq!(decimal(&recorded["balance"]["remaining"]), Decimal::ZERO);

    let purchase = app.get_data(&format!("/purchases/{}", purchase_id)).await;
    assert_eq!(purchase["status"], "paid");
    assert_eq!(purchase["is_paid"], true);

    let payments = app
        .get_data(&format!("/purchases/{}/payments", purchase_id))
        .await;
    assert_eq!(payments.as_array().unwrap().len(), 2);

    app.cleanup().await;
}

#[tokio::test]
async fn overpayment_is_rejected() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Diego Vargas", None).await;
    let purchase_id = app.create_purchase(&client_id, 100.0, "USD").await;
    app.record_payment(&purchase_id, 80.0).await;

    let response = app
        .post_json(
            &format!("/purchases/{}/payments", purchase_id),
            json!({ "amount": 30, "method": "card" }),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    let balance = app
        .get_data(&format!("/purchases/{}/balance", purchase_id))
        .await;
    assert_eq!(decimal(&balance["remaining"]), Decimal::from(20));

    app.cleanup().await;
}

#[tokio::test]
async fn amounts_are_rounded_to_cents_before_checks() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Elena Solano", None).await;
    let purchase_id = app.create_purchase(&client_id, 100.0, "USD").await;
    app.record_payment(&purchase_id, 50.0).await;

    let response = app
        .post_json(
            &format!("/purchases/{}/payments", purchase_id),
            json!({ "amount": "0.004", "method": "cash" }),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    let recorded = app
        .post_data(
            &format!("/purchases/{}/payments", purchase_id),
            json!({ "amount": "50.004", "method": "cash" }),
            201,
        )
        .await;
    assert_eq!(decimal(&recorded["payment"]["amount"]), Decimal::from(50));
    assert_eq!(recorded["balance"]["status"], "paid");
    assert_eq!(decimal(&recorded["balance"]["remaining"]), Decimal::ZERO);

    app.cleanup().await;
}

#[tokio::test]
async fn purchase_total_below_one_cent_is_rejected() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Fabian Rojas", None).await;

    let response = app
        .post_json(
            "/purchases",
            json!({ "client_id": client_id, "currency": "USD", "total_amount": "0.004" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let purchase = app
        .post_data(
            "/purchases",
            json!({ "client_id": client_id, "currency": "USD", "total_amount": "19.999" }),
            201,
        )
        .await;
    assert_eq!(decimal(&purchase["total_amount"]), Decimal::new(2000, 2));

    app.cleanup().await;
}

#[tokio::test]
async fn concurrent_payments_cannot_exceed_total() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Gabriela Chaves", None).await;
    let purchase_id = app.create_purchase(&client_id, 100.0, "USD").await;
    let path = format!("/purchases/{}/payments", purchase_id);

    let (first, second) = tokio::join!(
        app.post_json(&path, json!({ "amount": 60, "method": "cash" })),
        app.post_json(&path, json!({ "amount": 60, "method": "card" })),
    );
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![201, 400]);

    let balance = app
        .get_data(&format!("/purchases/{}/balance", purchase_id))
        .await;
    assert_eq!(decimal(&balance["paid"]), Decimal::from(60));
    assert_eq!(decimal(&balance["remaining"]), Decimal::from(40));

    app.cleanup().await;
}

#[tokio::test]
async fn payment_in_other_currency_is_converted() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Elena Solis", None).await;
    let purchase_id = app.create_purchase(&client_id, 100.0, "USD").await;

    // 25000 CRC at 500 CRC per USD is 50 USD
    let recorded = app
        .post_data(
            &format!("/purchases/{}/payments", purchase_id),
            json!({ "amount": 25000, "currency": "CRC", "method": "bank_transfer" }),
            201,
        )
        .await;
    assert_eq!(recorded["payment"]["currency"], "CRC");
    assert_eq!(decimal(&recorded["balance"]["paid"]), Decimal::from(50));
    assert_eq!(decimal(&recorded["balance"]["remaining"]), Decimal::from(50));

    let response = app
        .post_json(
            &format!("/purchases/{}/payments", purchase_id),
            json!({ "amount": 10, "currency": "EUR" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn scheduled_payment_needs_due_date() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Fabian Rojas", None).await;
    let purchase_id = app.create_purchase(&client_id, 100.0, "USD").await;

    let response = app
        .post_json(
            &format!("/purchases/{}/payments", purchase_id),
            json!({ "amount": 40, "status": "pending" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let recorded = app
        .post_data(
            &format!("/purchases/{}/payments", purchase_id),
            json!({ "amount": 40, "status": "pending", "due_date": "2099-01-01" }),
            201,
        )
        .await;
    assert_eq!(recorded["payment"]["status"], "pending");
    assert!(recorded["payment"]["paid_utc"].is_null());
    assert_eq!(recorded["balance"]["status"], "pending");

    app.cleanup().await;
}

#[tokio::test]
async fn monthly_plan_splits_total_and_marks_purchase_paid() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Gabriela Paz", None).await;
    let purchase_id = app.create_purchase(&client_id, 300.0, "USD").await;

    let plan = app
        .post_data(
            &format!("/purchases/{}/plan", purchase_id),
            json!({
                "installment_count": 3,
                "frequency": "monthly",
                "start_date": "2026-01-15"
            }),
            201,
        )
        .await;

    assert_eq!(decimal(&plan["total_amount"]), Decimal::from(300));
    let installments = plan["installments"].as_array().unwrap();
    assert_eq!(installments.len(), 3);

    let due: Vec<&str> = installments
        .iter()
        .map(|p| p["due_date"].as_str().unwrap())
        .collect();
    assert_eq!(due, vec!["2026-02-15", "2026-03-15", "2026-04-15"]);
    for installment in installments {
        assert_eq!(decimal(&installment["amount"]), Decimal::from(100));
        assert_eq!(installment["status"], "pending");
    }

    // A purchase gets one plan
    let response = app
        .post_json(
            &format!("/purchases/{}/plan", purchase_id),
            json!({ "installment_count": 2, "frequency": "weekly", "start_date": "2026-01-15" }),
        )
        .await;
    assert_eq!(response.status(), 409);

    let ids: Vec<String> = installments
        .iter()
        .map(|p| p["payment_id"].as_str().unwrap().to_string())
        .collect();

    for (i, payment_id) in ids.iter().enumerate() {
        let marked = app
            .post_data(
                &format!("/payments/{}/mark-paid", payment_id),
                json!({ "method": "card" }),
                200,
            )
            .await;
        let last = i == ids.len() - 1;
        assert_eq!(marked["purchase_paid"], last);
        assert_eq!(marked["payment"]["status"], "paid");
    }

    let purchase = app.get_data(&format!("/purchases/{}", purchase_id)).await;
    assert_eq!(purchase["is_paid"], true);
    assert_eq!(purchase["status"], "paid");

    // Marking twice is a conflict
    let response = app
        .post_empty(&format!("/payments/{}/mark-paid", ids[0]))
        .await;
    assert_eq!(response.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
async fn plan_with_down_payment_records_it_paid() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Hector Luna", None).await;
    let purchase_id = app.create_purchase(&client_id, 100.0, "USD").await;

    let plan = app
        .post_data(
            &format!("/purchases/{}/plan", purchase_id),
            json!({
                "down_payment": 10,
                "installment_count": 3,
                "frequency": "biweekly",
                "start_date": "2026-03-01"
            }),
            201,
        )
        .await;

    let installments = plan["installments"].as_array().unwrap();
    assert_eq!(installments.len(), 4);
    assert_eq!(installments[0]["installment_number"], 0);
    assert_eq!(installments[0]["status"], "paid");
    assert_eq!(decimal(&installments[0]["amount"]), Decimal::from(10));

    let amounts: Vec<Decimal> = installments[1..]
        .iter()
        .map(|p| decimal(&p["amount"]))
        .collect();
    assert_eq!(
        amounts,
        vec![Decimal::from(30), Decimal::from(30), Decimal::from(30)]
    );
    assert_eq!(installments[1]["due_date"], "2026-03-15");

    let balance = app
        .get_data(&format!("/purchases/{}/balance", purchase_id))
        .await;
    assert_eq!(balance["status"], "partial");
    assert_eq!(decimal(&balance["remaining"]), Decimal::from(90));

    let fetched = app
        .get_data(&format!("/purchases/{}/plan", purchase_id))
        .await;
    assert_eq!(fetched["plan_id"], plan["plan_id"]);

    app.cleanup().await;
}

#[tokio::test]
async fn plan_cannot_exceed_remaining_balance() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Irene Castro", None).await;
    let purchase_id = app.create_purchase(&client_id, 100.0, "USD").await;
    app.record_payment(&purchase_id, 40.0).await;

    let response = app
        .post_json(
            &format!("/purchases/{}/plan", purchase_id),
            json!({
                "total_amount": 100,
                "installment_count": 2,
                "frequency": "monthly",
                "start_date": "2026-01-01"
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .post_json(
            &format!("/purchases/{}/plan", purchase_id),
            json!({
                "down_payment": 60,
                "installment_count": 2,
                "frequency": "monthly",
                "start_date": "2026-01-01"
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn cancelled_payment_stops_counting() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Jorge Mena", None).await;
    let purchase_id = app.create_purchase(&client_id, 100.0, "USD").await;
    let recorded = app.record_payment(&purchase_id, 100.0).await;
    assert_eq!(recorded["balance"]["status"], "paid");
    let payment_id = recorded["payment"]["payment_id"].as_str().unwrap().to_string();

    let voided = app
        .post_data(&format!("/payments/{}/cancel", payment_id), json!({}), 200)
        .await;
    assert_eq!(voided["payment"]["status"], "cancelled");
    assert_eq!(voided["balance"]["status"], "pending");

    let purchase = app.get_data(&format!("/purchases/{}", purchase_id)).await;
    assert_eq!(purchase["is_paid"], false);

    let response = app
        .post_empty(&format!("/payments/{}/cancel", payment_id))
        .await;
    assert_eq!(response.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
async fn cancelled_purchase_rejects_payments() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Karla Ruiz", None).await;
    let purchase_id = app.create_purchase(&client_id, 100.0, "USD").await;
    app.post_data(&format!("/purchases/{}/cancel", purchase_id), json!({}), 200)
        .await;

    let response = app
        .post_json(
            &format!("/purchases/{}/payments", purchase_id),
            json!({ "amount": 10 }),
        )
        .await;
    assert_eq!(response.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
async fn sweep_flags_past_due_installments() {
    let app = TestApp::spawn().await;
    let client_id = app.create_client("Luis Soto", None).await;
    let purchase_id = app.create_purchase(&client_id, 200.0, "USD").await;

    app.post_data(
        &format!("/purchases/{}/plan", purchase_id),
        json!({
            "installment_count": 2,
            "frequency": "weekly",
            "start_date": "2020-01-01"
        }),
        201,
    )
    .await;

    let sweep = app
        .post_data("/payments/sweep-overdue", json!({}), 200)
        .await;
    assert_eq!(sweep["purchases_updated"], 1);
    assert_eq!(sweep["purchase_ids"][0], purchase_id.as_str());

    let payments = app
        .get_data(&format!("/purchases/{}/payments", purchase_id))
        .await;
    for payment in payments.as_array().unwrap() {
        assert_eq!(payment["status"], "overdue");
    }

    // Nothing left to flag
    let sweep = app
        .post_data("/payments/sweep-overdue", json!({}), 200)
        .await;
    assert_eq!(sweep["purchases_updated"], 0);

    app.cleanup().await;
}
