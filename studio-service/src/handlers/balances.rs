//! Balance, debtor and reminder actions.

use axum::extract::{Path, Query, State};
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::action::{ok, ActionResult};
use service_core::error::AppError;
use uuid::Uuid;

use super::{not_found, tracked};
use crate::{
    models::{Client, ClientBalance, Page, PurchaseBalance},
    services::notifier::{reminder_message, SmsMessage},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct ReminderSent {
    pub client_id: Uuid,
    pub to: String,
    pub provider_id: Option<String>,
    pub message: String,
}

pub async fn purchase_balance(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> ActionResult<PurchaseBalance> {
    let balance = tracked(
        "purchase_balance",
        state.balances.purchase_balance(purchase_id).await,
    )?;
    ok(balance)
}

pub async fn client_balance(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> ActionResult<ClientBalance> {
    let balance = tracked(
        "client_balance",
        state.balances.client_balance(client_id).await,
    )?;
    ok(balance)
}

pub async fn list_debtors(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ActionResult<Vec<Client>> {
    ok(state.db.list_debtors(page).await?)
}

/// Text the client a reminder of what they still owe.
pub async fn send_reminder(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> ActionResult<ReminderSent> {
    let result = remind(&state, client_id).await;
    ok(tracked("send_reminder", result)?)
}

async fn remind(state: &AppState, client_id: Uuid) -> Result<ReminderSent, AppError> {
    let client = state
        .db
        .get_client(client_id)
        .await?
        .ok_or_else(|| not_found("Client"))?;

    let phone = client
        .phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Client {} has no phone number", client.name))
        })?;

    let balance = state.balances.client_balance(client_id).await?;
    if balance.remaining <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Client {} has no outstanding balance",
            client.name
        )));
    }

    let message = reminder_message(&client.name, balance.remaining, &balance.currency);
    let receipt = state
        .sms
        .send(&SmsMessage {
            to: phone.to_string(),
            body: message.clone(),
        })
        .await?;

    tracing::info!(client_id = %client_id, remaining = %balance.remaining, "Payment reminder sent");

    Ok(ReminderSent {
        client_id,
        to: receipt.to,
        provider_id: receipt.provider_id,
        message,
    })
}
