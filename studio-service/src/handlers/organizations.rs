//! Organization actions.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::action::{created, ok, ActionResult, CreatedResult};
use uuid::Uuid;
use validator::Validate;

use super::{not_found, tracked};
use crate::{
    models::{CreateOrganization, ListOrganizationsFilter, Organization, Page, UpdateOrganization},
    AppState,
};

pub async fn create_organization(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrganization>,
) -> CreatedResult<Organization> {
    payload.validate()?;

    tracing::info!(name = %payload.name, kind = payload.kind.as_str(), "Creating organization");

    let organization = tracked(
        "create_organization",
        state.db.create_organization(&payload).await,
    )?;
    created(organization)
}

pub async fn get_organization(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
) -> ActionResult<Organization> {
    let organization = state
        .db
        .get_organization(organization_id)
        .await?
        .ok_or_else(|| not_found("Organization"))?;
    ok(organization)
}

pub async fn list_organizations(
    State(state): State<AppState>,
    Query(filter): Query<ListOrganizationsFilter>,
    Query(page): Query<Page>,
) -> ActionResult<Vec<Organization>> {
    ok(state.db.list_organizations(&filter, page).await?)
}

pub async fn update_organization(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
    Json(payload): Json<UpdateOrganization>,
) -> ActionResult<Organization> {
    payload.validate()?;

    let organization = tracked(
        "update_organization",
        state
            .db
            .update_organization(organization_id, &payload)
            .await
            .and_then(|o| o.ok_or_else(|| not_found("Organization"))),
    )?;
    ok(organization)
}

/// Organizations are referenced by clients and purchases, so they are only
/// ever deactivated.
pub async fn deactivate_organization(
    State(state): State<AppState>,
    Path(organization_id): Path<Uuid>,
) -> ActionResult<Organization> {
    let organization = tracked(
        "deactivate_organization",
        state
            .db
            .deactivate_organization(organization_id)
            .await
            .and_then(|o| o.ok_or_else(|| not_found("Organization"))),
    )?;
    ok(organization)
}
