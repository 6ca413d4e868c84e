pub mod allocations;
pub mod quotations;
pub mod vouchers;

use crate::services::Page;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::ValidationError;

pub use allocations::{
    AllocationOutcomeResponse, AllocationResponse, CreateAllocationRequest,
    UpdateAllocationRequest,
};
pub use quotations::{
    CreateQuotationRequest, QuotationListResponse, QuotationPaymentsResponse, QuotationResponse,
    RecomputeResponse, UpdateQuotationRequest,
};
pub use vouchers::{
    AvailableVoucherParams, CorrectVoucherRequest, CreateVoucherRequest, VoucherAllocationsResponse,
    VoucherListParams, VoucherListResponse, VoucherResponse,
};

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageParams {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.page_size)
    }
}

/// Largest amount accepted on any request. Totals of many such amounts
/// stay far inside what `Decimal` can hold.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

fn within_max(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= MAX_AMOUNT {
        Ok(())
    } else {
        let mut err = ValidationError::new("max_amount");
        err.message = Some("Amount is too large".into());
        Err(err)
    }
}

pub fn positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount > Decimal::ZERO {
        within_max(amount)
    } else {
        let mut err = ValidationError::new("positive_amount");
        err.message = Some("Amount must be greater than zero".into());
        Err(err)
    }
}

pub fn non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount >= Decimal::ZERO {
        within_max(amount)
    } else {
        let mut err = ValidationError::new("non_negative_amount");
        err.message = Some("Amount must not be negative".into());
        Err(err)
    }
}
