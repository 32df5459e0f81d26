//! Client and child actions.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use service_core::action::{created, ok, ActionResult, CreatedResult};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::{not_found, tracked};
use crate::{
    models::{
        Child, Client, CreateChild, CreateClient, ListChildrenFilter, ListClientsFilter, Page,
        UpdateChild, UpdateClient,
    },
    AppState,
};

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

// =============================================================================
// Clients
// =============================================================================

pub async fn create_client(
    State(state): State<AppState>,
    Json(payload): Json<CreateClient>,
) -> CreatedResult<Client> {
    payload.validate()?;

    if let Some(organization_id) = payload.organization_id {
        state
            .db
            .get_organization(organization_id)
            .await?
            .ok_or_else(|| not_found("Organization"))?;
    }

    let client = tracked("create_client", state.db.create_client(&payload).await)?;
    created(client)
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> ActionResult<Client> {
    let client = state
        .db
        .get_client(client_id)
        .await?
        .ok_or_else(|| not_found("Client"))?;
    ok(client)
}

pub async fn list_clients(
    State(state): State<AppState>,
    Query(filter): Query<ListClientsFilter>,
    Query(page): Query<Page>,
) -> ActionResult<Vec<Client>> {
    ok(state.db.list_clients(&filter, page).await?)
}

pub async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<UpdateClient>,
) -> ActionResult<Client> {
    payload.validate()?;

    let client = tracked(
        "update_client",
        state
            .db
            .update_client(client_id, &payload)
            .await
            .and_then(|c| c.ok_or_else(|| not_found("Client"))),
    )?;
    ok(client)
}

/// Only clients without purchases can be deleted.
pub async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> ActionResult<Deleted> {
    let deleted = tracked("delete_client", state.db.delete_client(client_id).await)?;
    if !deleted {
        return Err(not_found("Client"));
    }
    tracing::info!(client_id = %client_id, "Client deleted");
    ok(Deleted { deleted })
}

// =============================================================================
// Children
// =============================================================================

pub async fn create_child(
    State(state): State<AppState>,
    Json(payload): Json<CreateChild>,
) -> CreatedResult<Child> {
    payload.validate()?;

    if state.db.get_client(payload.client_id).await?.is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Client {} does not exist",
            payload.client_id
        )));
    }

    let child = tracked("create_child", state.db.create_child(&payload).await)?;
    created(child)
}

pub async fn get_child(
    State(state): State<AppState>,
    Path(child_id): Path<Uuid>,
) -> ActionResult<Child> {
    let child = state
        .db
        .get_child(child_id)
        .await?
        .ok_or_else(|| not_found("Child"))?;
    ok(child)
}

pub async fn list_children(
    State(state): State<AppState>,
    Query(filter): Query<ListChildrenFilter>,
    Query(page): Query<Page>,
) -> ActionResult<Vec<Child>> {
    ok(state.db.list_children(&filter, page).await?)
}

pub async fn update_child(
    State(state): State<AppState>,
    Path(child_id): Path<Uuid>,
    Json(payload): Json<UpdateChild>,
) -> ActionResult<Child> {
    payload.validate()?;

    let child = tracked(
        "update_child",
        state
            .db
            .update_child(child_id, &payload)
            .await
            .and_then(|c| c.ok_or_else(|| not_found("Child"))),
    )?;
    ok(child)
}

pub async fn delete_child(
    State(state): State<AppState>,
    Path(child_id): Path<Uuid>,
) -> ActionResult<Deleted> {
    let deleted = tracked("delete_child", state.db.delete_child(child_id).await)?;
    if !deleted {
        return Err(not_found("Child"));
    }
    ok(Deleted { deleted })
}
