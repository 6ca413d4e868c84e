//! Voucher ledger endpoints.

use crate::dtos::{
    AvailableVoucherParams, CorrectVoucherRequest, CreateVoucherRequest, PageParams,
    VoucherAllocationsResponse, VoucherListParams, VoucherListResponse, VoucherResponse,
};
use crate::middleware::Actor;
use crate::models::VoucherFilter;
use crate::services::AvailableVoucherQuery;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_voucher(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(payload): Json<CreateVoucherRequest>,
) -> Result<(StatusCode, Json<VoucherResponse>), AppError> {
    payload.validate()?;

    let voucher = state
        .vouchers
        .create_voucher(payload.into(), actor)
        .await?;

    Ok((StatusCode::CREATED, Json(voucher.into())))
}

pub async fn get_voucher(
    State(state): State<AppState>,
    Path(voucher_id): Path<String>,
) -> Result<Json<VoucherResponse>, AppError> {
    let voucher = state.vouchers.get_voucher(&voucher_id).await?;
    Ok(Json(voucher.into()))
}

pub async fn list_vouchers(
    State(state): State<AppState>,
    Query(params): Query<VoucherListParams>,
) -> Result<Json<VoucherListResponse>, AppError> {
    let page = PageParams {
        page: params.page,
        page_size: params.page_size,
    }
    .page();
    let filter = VoucherFilter {
        voucher_type: params.voucher_type,
        party: params.party.filter(|p| !p.trim().is_empty()),
        available_only: false,
    };

    let (vouchers, total) = state.vouchers.list_vouchers(&filter, page).await?;

    Ok(Json(VoucherListResponse {
        vouchers: vouchers.into_iter().map(VoucherResponse::from).collect(),
        total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages(total),
    }))
}

pub async fn correct_voucher(
    State(state): State<AppState>,
    Path(voucher_id): Path<String>,
    Json(payload): Json<CorrectVoucherRequest>,
) -> Result<Json<VoucherResponse>, AppError> {
    payload.validate()?;

    let voucher = state
        .vouchers
        .correct_voucher(&voucher_id, payload.into())
        .await?;

    Ok(Json(voucher.into()))
}

pub async fn delete_voucher(
    State(state): State<AppState>,
    Path(voucher_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.vouchers.delete_voucher(&voucher_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_voucher_allocations(
    State(state): State<AppState>,
    Path(voucher_id): Path<String>,
) -> Result<Json<VoucherAllocationsResponse>, AppError> {
    let (voucher, links) = state.allocations.voucher_allocations(&voucher_id).await?;
    Ok(Json(VoucherAllocationsResponse::new(voucher, links)))
}

/// Vouchers that still have money to allocate, newest first.
pub async fn list_available_vouchers(
    State(state): State<AppState>,
    Query(params): Query<AvailableVoucherParams>,
) -> Result<Json<Vec<VoucherResponse>>, AppError> {
    let exclude_quotation = match (params.quotation_type, params.quotation_id) {
        (Some(kind), Some(id)) => Some((kind, id)),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "quotation_type and quotation_id must be given together"
            )))
        }
    };

    let query = AvailableVoucherQuery {
        voucher_type: params.voucher_type,
        party: params.party.filter(|p| !p.trim().is_empty()),
        exclude_quotation,
    };
    let vouchers = state.allocations.search_available_vouchers(&query).await?;

    Ok(Json(
        vouchers.into_iter().map(VoucherResponse::from).collect(),
    ))
}
