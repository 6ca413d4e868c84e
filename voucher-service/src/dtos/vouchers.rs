use crate::models::{NewVoucher, PaymentLink, Voucher, VoucherCorrection, VoucherType};
use crate::dtos::{positive_amount, AllocationResponse};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVoucherRequest {
    pub voucher_type: VoucherType,

    #[validate(length(min = 1, max = 200, message = "Party must be 1-200 characters"))]
    pub party: String,

    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,

    pub date: NaiveDate,

    #[validate(length(max = 50))]
    pub payment_mode: Option<String>,

    #[validate(length(max = 100))]
    pub reference: Option<String>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<CreateVoucherRequest> for NewVoucher {
    fn from(req: CreateVoucherRequest) -> Self {
        Self {
            voucher_type: req.voucher_type,
            party: req.party.trim().to_string(),
            amount: req.amount,
            date: req.date,
            payment_mode: req.payment_mode,
            reference: req.reference,
            notes: req.notes,
        }
    }
}

/// Administrative correction; only the fields present are changed.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CorrectVoucherRequest {
    #[validate(length(min = 1, max = 200, message = "Party must be 1-200 characters"))]
    pub party: Option<String>,

    #[validate(custom(function = "positive_amount"))]
    pub amount: Option<Decimal>,

    pub date: Option<NaiveDate>,

    #[validate(length(max = 50))]
    pub payment_mode: Option<String>,

    #[validate(length(max = 100))]
    pub reference: Option<String>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<CorrectVoucherRequest> for VoucherCorrection {
    fn from(req: CorrectVoucherRequest) -> Self {
        Self {
            party: req.party.map(|p| p.trim().to_string()),
            amount: req.amount,
            date: req.date,
            payment_mode: req.payment_mode,
            reference: req.reference,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VoucherListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub voucher_type: Option<VoucherType>,
    pub party: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableVoucherParams {
    pub voucher_type: Option<VoucherType>,
    pub party: Option<String>,
    /// With `quotation_id`, leaves out vouchers already linked to that quotation.
    pub quotation_type: Option<crate::models::QuotationKind>,
    pub quotation_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoucherResponse {
    pub id: String,
    pub voucher_no: String,
    pub voucher_type: VoucherType,
    pub party: String,
    pub amount: Decimal,
    pub allocated_amount: Decimal,
    pub available_balance: Decimal,
    pub date: NaiveDate,
    pub payment_mode: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Voucher> for VoucherResponse {
    fn from(voucher: Voucher) -> Self {
        Self {
            available_balance: voucher.available_balance(),
            id: voucher.id,
            voucher_no: voucher.voucher_no,
            voucher_type: voucher.voucher_type,
            party: voucher.party,
            amount: voucher.amount,
            allocated_amount: voucher.allocated_amount,
            date: voucher.date,
            payment_mode: voucher.payment_mode,
            reference: voucher.reference,
            notes: voucher.notes,
            created_by: voucher.created_by,
            created_at: voucher.created_at.to_rfc3339(),
            updated_at: voucher.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoucherListResponse {
    pub vouchers: Vec<VoucherResponse>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoucherAllocationsResponse {
    pub voucher: VoucherResponse,
    pub allocations: Vec<AllocationResponse>,
}

impl VoucherAllocationsResponse {
    pub fn new(voucher: Voucher, links: Vec<PaymentLink>) -> Self {
        Self {
            voucher: voucher.into(),
            allocations: links.into_iter().map(AllocationResponse::from).collect(),
        }
    }
}
