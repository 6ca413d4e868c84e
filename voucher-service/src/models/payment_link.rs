//! Payment link: the share of a voucher attributed to one quotation.

use super::QuotationKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    #[serde(rename = "_id")]
    pub id: String,
    pub voucher_id: String,
    pub quotation_id: String,
    pub quotation_type: QuotationKind,
    pub allocated_amount: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl PaymentLink {
    pub fn new(input: NewAllocation, created_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            voucher_id: input.voucher_id,
            quotation_id: input.quotation_id,
            quotation_type: input.quotation_type,
            allocated_amount: input.amount,
            notes: input.notes,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_for(&self, kind: QuotationKind, quotation_id: &str) -> bool {
        self.quotation_type == kind && self.quotation_id == quotation_id
    }
}

/// Request to attribute part of a voucher to a quotation.
#[derive(Debug, Clone)]
pub struct NewAllocation {
    pub voucher_id: String,
    pub quotation_id: String,
    pub quotation_type: QuotationKind,
    pub amount: Decimal,
    pub notes: Option<String>,
}

/// State of both sides of a link right after an allocation change.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    pub link: PaymentLink,
    pub voucher_available: Decimal,
    pub quotation_total_paid: Decimal,
}
