//! Payment link endpoints: attribute, resize and release voucher amounts.

use crate::dtos::{AllocationOutcomeResponse, CreateAllocationRequest, UpdateAllocationRequest};
use crate::middleware::Actor;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_allocation(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(payload): Json<CreateAllocationRequest>,
) -> Result<(StatusCode, Json<AllocationOutcomeResponse>), AppError> {
    payload.validate()?;

    let outcome = state.allocations.link(payload.into(), actor).await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

pub async fn update_allocation(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
    Json(payload): Json<UpdateAllocationRequest>,
) -> Result<Json<AllocationOutcomeResponse>, AppError> {
    payload.validate()?;

    let outcome = state
        .allocations
        .update_link(&link_id, payload.amount)
        .await?;

    Ok(Json(outcome.into()))
}

/// Remove a link; the response carries the released link and the new balances.
pub async fn delete_allocation(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> Result<Json<AllocationOutcomeResponse>, AppError> {
    let outcome = state.allocations.unlink(&link_id).await?;
    Ok(Json(outcome.into()))
}
