//! Inventory and bundle actions.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::action::{created, ok, ActionResult, CreatedResult};
use uuid::Uuid;
use validator::Validate;

use super::{not_found, tracked};
use crate::{
    models::{
        AdjustStock, Bundle, BundleWithItems, CreateBundle, CreateInventoryItem, InventoryItem,
        ListBundlesFilter, ListInventoryFilter, Page, SetBundleItems, UpdateBundle,
        UpdateInventoryItem,
    },
    AppState,
};

// =============================================================================
// Inventory
// =============================================================================

pub async fn create_inventory_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateInventoryItem>,
) -> CreatedResult<InventoryItem> {
    payload.validate()?;
    let item = tracked(
        "create_inventory_item",
        state.db.create_inventory_item(&payload).await,
    )?;
    created(item)
}

pub async fn get_inventory_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> ActionResult<InventoryItem> {
    let item = state
        .db
        .get_inventory_item(item_id)
        .await?
        .ok_or_else(|| not_found("Inventory item"))?;
    ok(item)
}

pub async fn list_inventory_items(
    State(state): State<AppState>,
    Query(filter): Query<ListInventoryFilter>,
    Query(page): Query<Page>,
) -> ActionResult<Vec<InventoryItem>> {
    ok(state.db.list_inventory_items(&filter, page).await?)
}

pub async fn update_inventory_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateInventoryItem>,
) -> ActionResult<InventoryItem> {
    payload.validate()?;
    let item = tracked(
        "update_inventory_item",
        state
            .db
            .update_inventory_item(item_id, &payload)
            .await
            .and_then(|i| i.ok_or_else(|| not_found("Inventory item"))),
    )?;
    ok(item)
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<AdjustStock>,
) -> ActionResult<InventoryItem> {
    payload.validate()?;

    tracing::info!(
        item_id = %item_id,
        delta = payload.delta,
        reason = payload.reason.as_deref().unwrap_or(""),
        "Adjusting stock"
    );

    let item = tracked(
        "adjust_stock",
        state.db.adjust_stock(item_id, payload.delta).await,
    )?;
    ok(item)
}

// =============================================================================
// Bundles
// =============================================================================

pub async fn create_bundle(
    State(state): State<AppState>,
    Json(payload): Json<CreateBundle>,
) -> CreatedResult<BundleWithItems> {
    payload.validate()?;
    let bundle = tracked("create_bundle", state.db.create_bundle(&payload).await)?;
    created(bundle)
}

pub async fn get_bundle(
    State(state): State<AppState>,
    Path(bundle_id): Path<Uuid>,
) -> ActionResult<BundleWithItems> {
    let bundle = state
        .db
        .get_bundle_with_items(bundle_id)
        .await?
        .ok_or_else(|| not_found("Bundle"))?;
    ok(bundle)
}

pub async fn list_bundles(
    State(state): State<AppState>,
    Query(filter): Query<ListBundlesFilter>,
    Query(page): Query<Page>,
) -> ActionResult<Vec<Bundle>> {
    ok(state.db.list_bundles(&filter, page).await?)
}

pub async fn update_bundle(
    State(state): State<AppState>,
    Path(bundle_id): Path<Uuid>,
    Json(payload): Json<UpdateBundle>,
) -> ActionResult<Bundle> {
    payload.validate()?;
    let bundle = tracked(
        "update_bundle",
        state
            .db
            .update_bundle(bundle_id, &payload)
            .await
            .and_then(|b| b.ok_or_else(|| not_found("Bundle"))),
    )?;
    ok(bundle)
}

pub async fn set_bundle_items(
    State(state): State<AppState>,
    Path(bundle_id): Path<Uuid>,
    Json(payload): Json<SetBundleItems>,
) -> ActionResult<BundleWithItems> {
    payload.validate()?;
    let bundle = tracked(
        "set_bundle_items",
        state
            .db
            .set_bundle_items(bundle_id, &payload.items)
            .await
            .and_then(|b| b.ok_or_else(|| not_found("Bundle"))),
    )?;
    ok(bundle)
}

pub async fn deactivate_bundle(
    State(state): State<AppState>,
    Path(bundle_id): Path<Uuid>,
) -> ActionResult<Bundle> {
    let bundle = tracked(
        "deactivate_bundle",
        state
            .db
            .deactivate_bundle(bundle_id)
            .await
            .and_then(|b| b.ok_or_else(|| not_found("Bundle"))),
    )?;
    ok(bundle)
}
