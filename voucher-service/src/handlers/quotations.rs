//! Quotation endpoints, one route set for all six variants.

use crate::dtos::{
    CreateQuotationRequest, PageParams, QuotationListResponse, QuotationPaymentsResponse,
    QuotationResponse, RecomputeResponse, UpdateQuotationRequest,
};
use crate::middleware::Actor;
use crate::models::QuotationKind;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

fn parse_kind(kind: &str) -> Result<QuotationKind, AppError> {
    kind.parse()
        .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e)))
}

pub async fn create_quotation(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Actor(actor): Actor,
    Json(payload): Json<CreateQuotationRequest>,
) -> Result<(StatusCode, Json<QuotationResponse>), AppError> {
    let kind = parse_kind(&kind)?;
    payload.validate()?;

    let quotation = state
        .quotations
        .create_quotation(kind, payload.into(), actor)
        .await?;

    Ok((StatusCode::CREATED, Json(quotation.into())))
}

pub async fn list_quotations(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<QuotationListResponse>, AppError> {
    let kind = parse_kind(&kind)?;
    let page = params.page();

    let (quotations, total) = state.quotations.list_quotations(kind, page).await?;

    Ok(Json(QuotationListResponse {
        quotations: quotations.into_iter().map(QuotationResponse::from).collect(),
        total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages(total),
    }))
}

pub async fn get_quotation(
    State(state): State<AppState>,
    Path((kind, quotation_id)): Path<(String, String)>,
) -> Result<Json<QuotationResponse>, AppError> {
    let kind = parse_kind(&kind)?;
    let quotation = state.quotations.get_quotation(kind, &quotation_id).await?;
    Ok(Json(quotation.into()))
}

pub async fn update_quotation(
    State(state): State<AppState>,
    Path((kind, quotation_id)): Path<(String, String)>,
    Json(payload): Json<UpdateQuotationRequest>,
) -> Result<Json<QuotationResponse>, AppError> {
    let kind = parse_kind(&kind)?;
    payload.validate()?;

    let quotation = state
        .quotations
        .update_quotation(kind, &quotation_id, payload.into())
        .await?;

    Ok(Json(quotation.into()))
}

pub async fn get_quotation_payments(
    State(state): State<AppState>,
    Path((kind, quotation_id)): Path<(String, String)>,
) -> Result<Json<QuotationPaymentsResponse>, AppError> {
    let kind = parse_kind(&kind)?;
    let payments = state
        .allocations
        .quotation_payments(kind, &quotation_id)
        .await?;
    Ok(Json(payments.into()))
}

/// Administrative repair: rebuild `total_paid` from the payment links.
pub async fn recompute_quotation_total(
    State(state): State<AppState>,
    Path((kind, quotation_id)): Path<(String, String)>,
) -> Result<Json<RecomputeResponse>, AppError> {
    let kind = parse_kind(&kind)?;
    state
        .allocations
        .recompute_quotation_total(kind, &quotation_id)
        .await?;
    let quotation = state.quotations.get_quotation(kind, &quotation_id).await?;
    Ok(Json(quotation.into()))
}
