use crate::dtos::positive_amount;
use crate::models::{AllocationOutcome, NewAllocation, PaymentLink, QuotationKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAllocationRequest {
    #[validate(length(min = 1, message = "voucher_id is required"))]
    pub voucher_id: String,

    #[validate(length(min = 1, message = "quotation_id is required"))]
    pub quotation_id: String,

    pub quotation_type: QuotationKind,

    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<CreateAllocationRequest> for NewAllocation {
    fn from(req: CreateAllocationRequest) -> Self {
        Self {
            voucher_id: req.voucher_id,
            quotation_id: req.quotation_id,
            quotation_type: req.quotation_type,
            amount: req.amount,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAllocationRequest {
    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub id: String,
    pub voucher_id: String,
    pub quotation_id: String,
    pub quotation_type: QuotationKind,
    pub allocated_amount: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PaymentLink> for AllocationResponse {
    fn from(link: PaymentLink) -> Self {
        Self {
            id: link.id,
            voucher_id: link.voucher_id,
            quotation_id: link.quotation_id,
            quotation_type: link.quotation_type,
            allocated_amount: link.allocated_amount,
            notes: link.notes,
            created_by: link.created_by,
            created_at: link.created_at.to_rfc3339(),
            updated_at: link.updated_at.to_rfc3339(),
        }
    }
}

/// The link after the change, with the balances it left behind.
#[derive(Debug, Serialize, Deserialize)]
pub struct AllocationOutcomeResponse {
    pub allocation: AllocationResponse,
    pub voucher_available: Decimal,
    pub quotation_total_paid: Decimal,
}

impl From<AllocationOutcome> for AllocationOutcomeResponse {
    fn from(outcome: AllocationOutcome) -> Self {
        Self {
            allocation: outcome.link.into(),
            voucher_available: outcome.voucher_available,
            quotation_total_paid: outcome.quotation_total_paid,
        }
    }
}
