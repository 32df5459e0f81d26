//! Payment and payment plan actions.
//!
//! Every action that moves money refreshes the purchase's stored status and
//! the client's debtor flag afterwards.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::action::{created, ok, ActionResult, CreatedResult};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::{not_found, tracked};
use crate::{
    models::{
        CreatePaymentPlan, MarkPaymentPaid, Payment, PaymentPlanWithInstallments, PaymentStatus,
        Purchase, PurchaseBalance, RecordPayment,
    },
    services::{metrics::record_payment_received, payment_plan::build_schedule},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct PaymentRecorded {
    pub payment: Payment,
    pub balance: PurchaseBalance,
}

#[derive(Debug, Serialize)]
pub struct PaymentMarkedPaid {
    pub payment: Payment,
    /// The payment closed the last open installment of its purchase.
    pub purchase_paid: bool,
    pub balance: PurchaseBalance,
}

#[derive(Debug, Serialize)]
pub struct OverdueSweep {
    pub purchases_updated: usize,
    pub purchase_ids: Vec<Uuid>,
}

async fn open_purchase(state: &AppState, purchase_id: Uuid) -> Result<Purchase, AppError> {
    let purchase = state
        .db
        .get_purchase(purchase_id)
        .await?
        .ok_or_else(|| not_found("Purchase"))?;

    if purchase.is_cancelled() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Purchase {} is cancelled",
            purchase_id
        )));
    }
    Ok(purchase)
}

fn record_received(payment: &Payment) {
    record_payment_received(
        &payment.currency,
        &payment.method,
        payment.amount.to_f64().unwrap_or_default(),
    );
}

/// Record money received now, or schedule a pending payment.
pub async fn record_payment(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Json(mut payload): Json<RecordPayment>,
) -> CreatedResult<PaymentRecorded> {
    payload.validate()?;
    payload.amount = payload.amount.round_dp(2);
    let result = apply_payment(&state, purchase_id, &payload).await;
    created(tracked("record_payment", result)?)
}

async fn apply_payment(
    state: &AppState,
    purchase_id: Uuid,
    payload: &RecordPayment,
) -> Result<PaymentRecorded, AppError> {
    if payload.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment amount must be greater than zero"
        )));
    }

    let purchase = open_purchase(state, purchase_id).await?;
    let currency = payload
        .currency
        .as_deref()
        .map(str::to_uppercase)
        .unwrap_or_else(|| purchase.currency.clone());

    state.balances.ensure_convertible(&purchase, &currency)?;

    let lock = state.db.lock_purchase(purchase_id).await?;
    let is_paid = payload.status.unwrap_or(PaymentStatus::Paid) == PaymentStatus::Paid;
    if is_paid {
        state
            .balances
            .ensure_within_total(&purchase, &lock.paid, payload.amount, &currency)
            .await?;
    }

    let payment = state.db.insert_payment(lock, &currency, payload).await?;
    if is_paid {
        record_received(&payment);
    }

    let balance = state.balances.refresh_after_payment(purchase_id).await?;
    Ok(PaymentRecorded { payment, balance })
}

pub async fn list_payments(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> ActionResult<Vec<Payment>> {
    if state.db.get_purchase(purchase_id).await?.is_none() {
        return Err(not_found("Purchase"));
    }
    ok(state.db.list_payments_for_purchase(purchase_id).await?)
}

pub async fn mark_payment_paid(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    payload: Option<Json<MarkPaymentPaid>>,
) -> ActionResult<PaymentMarkedPaid> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;
    let result = settle_payment(&state, payment_id, &payload).await;
    ok(tracked("mark_payment_paid", result)?)
}

async fn settle_payment(
    state: &AppState,
    payment_id: Uuid,
    payload: &MarkPaymentPaid,
) -> Result<PaymentMarkedPaid, AppError> {
    let payment = state
        .db
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| not_found("Payment"))?;
    let purchase = open_purchase(state, payment.purchase_id).await?;

    let lock = state.db.lock_purchase(purchase.purchase_id).await?;
    if payment.status().is_open() {
        state
            .balances
            .ensure_within_total(&purchase, &lock.paid, payment.amount, &payment.currency)
            .await?;
    }

    let (payment, purchase_paid) = state
        .db
        .mark_payment_paid(lock, payment_id, payload)
        .await?;
    record_received(&payment);

    let balance = state
        .balances
        .refresh_after_payment(payment.purchase_id)
        .await?;
    Ok(PaymentMarkedPaid {
        payment,
        purchase_paid,
        balance,
    })
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> ActionResult<PaymentRecorded> {
    let result = void_payment(&state, payment_id).await;
    ok(tracked("cancel_payment", result)?)
}

async fn void_payment(state: &AppState, payment_id: Uuid) -> Result<PaymentRecorded, AppError> {
    let payment = state.db.cancel_payment(payment_id).await?;
    let balance = state
        .balances
        .refresh_after_payment(payment.purchase_id)
        .await?;
    Ok(PaymentRecorded { payment, balance })
}

/// Flag pending payments past their due date and refresh the balances they
/// touch.
pub async fn sweep_overdue(State(state): State<AppState>) -> ActionResult<OverdueSweep> {
    let result = flag_overdue(&state).await;
    ok(tracked("sweep_overdue", result)?)
}

async fn flag_overdue(state: &AppState) -> Result<OverdueSweep, AppError> {
    let today = Utc::now().date_naive();
    let purchase_ids = state.db.mark_overdue_payments(today).await?;
    for purchase_id in &purchase_ids {
        state.balances.refresh_after_payment(*purchase_id).await?;
    }
    tracing::info!(purchases = purchase_ids.len(), today = %today, "Overdue sweep finished");
    Ok(OverdueSweep {
        purchases_updated: purchase_ids.len(),
        purchase_ids,
    })
}

/// Split what is left to pay on a purchase into installments.
///
/// The plan total defaults to the purchase's remaining balance and may not
/// exceed it. A down payment is recorded as paid immediately.
pub async fn create_payment_plan(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
    Json(payload): Json<CreatePaymentPlan>,
) -> CreatedResult<PaymentPlanWithInstallments> {
    payload.validate()?;
    let result = plan_installments(&state, purchase_id, &payload).await;
    created(tracked("create_payment_plan", result)?)
}

async fn plan_installments(
    state: &AppState,
    purchase_id: Uuid,
    payload: &CreatePaymentPlan,
) -> Result<PaymentPlanWithInstallments, AppError> {
    let purchase = open_purchase(state, purchase_id).await?;
    let balance = state.balances.purchase_balance(purchase_id).await?;

    let total = payload
        .total_amount
        .map(|t| t.round_dp(2))
        .unwrap_or(balance.remaining);
    if total > balance.remaining {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Plan total {} exceeds the remaining balance of {} {}",
            total,
            balance.remaining,
            purchase.currency
        )));
    }

    let down_payment = payload
        .down_payment
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO);
    let schedule = build_schedule(
        total,
        down_payment,
        payload.installment_count,
        payload.frequency,
        payload.start_date,
    )?;

    let plan = state
        .db
        .create_payment_plan(&purchase, payload, total, &schedule)
        .await?;

    if let Some(down) = plan
        .installments
        .iter()
        .find(|p| p.installment_number == Some(0))
    {
        record_received(down);
    }
    state.balances.refresh_after_payment(purchase_id).await?;

    Ok(plan)
}

pub async fn get_payment_plan(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> ActionResult<PaymentPlanWithInstallments> {
    let plan = state
        .db
        .get_payment_plan(purchase_id)
        .await?
        .ok_or_else(|| not_found("Payment plan"))?;
    ok(plan)
}
