use crate::dtos::non_negative_amount;
use crate::models::{
    NewQuotation, PaymentLink, PaymentStatus, Quotation, QuotationKind, QuotationUpdate, Voucher,
    VoucherType,
};
use crate::services::QuotationPayments;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuotationRequest {
    #[validate(length(min = 1, max = 200, message = "Client name must be 1-200 characters"))]
    pub client_name: String,

    #[validate(custom(function = "non_negative_amount"))]
    pub total_amount: Decimal,

    /// Variant-specific content (itinerary, rooms, fares, ...), stored as is.
    pub details: Option<serde_json::Value>,
}

impl From<CreateQuotationRequest> for NewQuotation {
    fn from(req: CreateQuotationRequest) -> Self {
        Self {
            client_name: req.client_name.trim().to_string(),
            total_amount: req.total_amount,
            details: req.details,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateQuotationRequest {
    #[validate(length(min = 1, max = 200, message = "Client name must be 1-200 characters"))]
    pub client_name: Option<String>,

    #[validate(custom(function = "non_negative_amount"))]
    pub total_amount: Option<Decimal>,

    pub details: Option<serde_json::Value>,
}

impl From<UpdateQuotationRequest> for QuotationUpdate {
    fn from(req: UpdateQuotationRequest) -> Self {
        Self {
            client_name: req.client_name.map(|n| n.trim().to_string()),
            total_amount: req.total_amount,
            details: req.details,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuotationResponse {
    pub quotation_id: String,
    pub quotation_type: QuotationKind,
    pub client_name: String,
    pub total_amount: Decimal,
    pub total_paid: Decimal,
    pub balance_due: Decimal,
    pub payment_status: PaymentStatus,
    pub details: serde_json::Value,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Quotation> for QuotationResponse {
    fn from(quotation: Quotation) -> Self {
        Self {
            balance_due: quotation.balance_due(),
            payment_status: quotation.payment_status(),
            quotation_id: quotation.quotation_id,
            quotation_type: quotation.kind,
            client_name: quotation.client_name,
            total_amount: quotation.total_amount,
            total_paid: quotation.total_paid,
            details: quotation.details,
            created_by: quotation.created_by,
            created_at: quotation.created_at.to_rfc3339(),
            updated_at: quotation.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuotationListResponse {
    pub quotations: Vec<QuotationResponse>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

/// One payment attributed to a quotation, with the voucher it came from.
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub link_id: String,
    pub voucher_id: String,
    pub voucher_no: Option<String>,
    pub voucher_type: Option<VoucherType>,
    pub party: Option<String>,
    pub date: Option<NaiveDate>,
    pub allocated_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: String,
}

impl PaymentEntry {
    fn new(link: PaymentLink, voucher: Option<Voucher>) -> Self {
        Self {
            link_id: link.id,
            voucher_id: link.voucher_id,
            voucher_no: voucher.as_ref().map(|v| v.voucher_no.clone()),
            voucher_type: voucher.as_ref().map(|v| v.voucher_type),
            party: voucher.as_ref().map(|v| v.party.clone()),
            date: voucher.as_ref().map(|v| v.date),
            allocated_amount: link.allocated_amount,
            notes: link.notes,
            created_at: link.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuotationPaymentsResponse {
    pub quotation_id: String,
    pub quotation_type: QuotationKind,
    pub client_name: String,
    pub total_amount: Decimal,
    pub total_paid: Decimal,
    pub balance_due: Decimal,
    pub payment_status: PaymentStatus,
    pub payments: Vec<PaymentEntry>,
}

impl From<QuotationPayments> for QuotationPaymentsResponse {
    fn from(summary: QuotationPayments) -> Self {
        let quotation = summary.quotation;
        Self {
            balance_due: quotation.balance_due(),
            payment_status: quotation.payment_status(),
            quotation_id: quotation.quotation_id,
            quotation_type: quotation.kind,
            client_name: quotation.client_name,
            total_amount: quotation.total_amount,
            total_paid: quotation.total_paid,
            payments: summary
                .payments
                .into_iter()
                .map(|(link, voucher)| PaymentEntry::new(link, voucher))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecomputeResponse {
    pub quotation_id: String,
    pub quotation_type: QuotationKind,
    pub total_paid: Decimal,
    pub balance_due: Decimal,
    pub payment_status: PaymentStatus,
}

impl From<Quotation> for RecomputeResponse {
    fn from(quotation: Quotation) -> Self {
        Self {
            balance_due: quotation.balance_due(),
            payment_status: quotation.payment_status(),
            quotation_id: quotation.quotation_id,
            quotation_type: quotation.kind,
            total_paid: quotation.total_paid,
        }
    }
}
