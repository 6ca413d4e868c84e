//! Voucher model: money received from or paid to a party.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of the money recorded by a voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherType {
    Receive,
    Payment,
}

impl VoucherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receive => "receive",
            Self::Payment => "payment",
        }
    }

    /// Prefix of the sequential voucher number, e.g. `RV-000042`.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            Self::Receive => "RV-",
            Self::Payment => "PV-",
        }
    }
}

impl std::fmt::Display for VoucherType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    #[serde(rename = "_id")]
    pub id: String,
    pub voucher_no: String,
    pub voucher_type: VoucherType,
    pub party: String,
    pub amount: Decimal,
    /// Sum of all payment links against this voucher. Maintained by the store
    /// in the same atomic unit as the links themselves.
    pub allocated_amount: Decimal,
    /// Set once `allocated_amount` reaches `amount`. Listings of vouchers
    /// with money left filter on this flag.
    #[serde(default)]
    pub fully_allocated: bool,
    pub date: NaiveDate,
    pub payment_mode: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Voucher {
    pub fn new(input: NewVoucher, voucher_no: String, created_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            voucher_no,
            voucher_type: input.voucher_type,
            party: input.party,
            amount: input.amount,
            allocated_amount: Decimal::ZERO,
            fully_allocated: false,
            date: input.date,
            payment_mode: input.payment_mode,
            reference: input.reference,
            notes: input.notes,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Amount still free to allocate.
    pub fn available_balance(&self) -> Decimal {
        self.amount - self.allocated_amount
    }

    pub fn set_allocated(&mut self, allocated: Decimal) {
        self.allocated_amount = allocated;
        self.fully_allocated = allocated >= self.amount;
    }
}

/// Input for recording a new voucher.
#[derive(Debug, Clone)]
pub struct NewVoucher {
    pub voucher_type: VoucherType,
    pub party: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub payment_mode: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Administrative correction of a recorded voucher. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct VoucherCorrection {
    pub party: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
    pub payment_mode: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl VoucherCorrection {
    pub fn apply(&self, voucher: &mut Voucher) {
        if let Some(party) = &self.party {
            voucher.party = party.clone();
        }
        if let Some(amount) = self.amount {
            voucher.amount = amount;
            voucher.fully_allocated = voucher.allocated_amount >= amount;
        }
        if let Some(date) = self.date {
            voucher.date = date;
        }
        if let Some(mode) = &self.payment_mode {
            voucher.payment_mode = Some(mode.clone());
        }
        if let Some(reference) = &self.reference {
            voucher.reference = Some(reference.clone());
        }
        if let Some(notes) = &self.notes {
            voucher.notes = Some(notes.clone());
        }
        voucher.updated_at = Utc::now();
    }
}

/// Filter for listing vouchers.
#[derive(Debug, Clone, Default)]
pub struct VoucherFilter {
    pub voucher_type: Option<VoucherType>,
    /// Case-insensitive substring of the party name.
    pub party: Option<String>,
    /// Only vouchers with part of their amount still unallocated.
    pub available_only: bool,
}

impl VoucherFilter {
    pub fn matches(&self, voucher: &Voucher) -> bool {
        if let Some(voucher_type) = self.voucher_type {
            if voucher.voucher_type != voucher_type {
                return false;
            }
        }
        if self.available_only && voucher.fully_allocated {
            return false;
        }
        match &self.party {
            Some(party) => voucher
                .party
                .to_lowercase()
                .contains(&party.to_lowercase()),
            None => true,
        }
    }
}
