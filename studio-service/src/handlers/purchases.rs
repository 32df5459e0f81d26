//! Purchase actions.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::action::{created, ok, ActionResult, CreatedResult};
use uuid::Uuid;
use validator::Validate;

use super::{not_found, tracked};
use crate::{
    models::{CreatePurchase, ListPurchasesFilter, Page, Purchase},
    AppState,
};

pub async fn create_purchase(
    State(state): State<AppState>,
    Json(mut payload): Json<CreatePurchase>,
) -> CreatedResult<Purchase> {
    payload.validate()?;
    payload.total_amount = payload.total_amount.map(|t| t.round_dp(2));

    tracing::info!(
        client_id = %payload.client_id,
        bundle_id = ?payload.bundle_id,
        "Creating purchase"
    );

    let purchase = tracked("create_purchase", state.db.create_purchase(&payload).await)?;
    created(purchase)
}

pub async fn get_purchase(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> ActionResult<Purchase> {
    let purchase = state
        .db
        .get_purchase(purchase_id)
        .await?
        .ok_or_else(|| not_found("Purchase"))?;
    ok(purchase)
}

pub async fn list_purchases(
    State(state): State<AppState>,
    Query(filter): Query<ListPurchasesFilter>,
    Query(page): Query<Page>,
) -> ActionResult<Vec<Purchase>> {
    ok(state.db.list_purchases(&filter, page).await?)
}

/// Cancel a purchase and its open payments. The client's debtor flag is
/// recomputed since the purchase no longer counts.
pub async fn cancel_purchase(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> ActionResult<Purchase> {
    let purchase = tracked(
        "cancel_purchase",
        state
            .db
            .cancel_purchase(purchase_id)
            .await
            .and_then(|p| p.ok_or_else(|| not_found("Purchase"))),
    )?;

    state.balances.client_balance(purchase.client_id).await?;
    ok(purchase)
}
