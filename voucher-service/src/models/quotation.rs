//! Quotation model shared by the six quotation variants.
//!
//! Each variant lives in its own collection and keeps its total amount at a
//! variant-specific field path (`pricing.total_amount` for hotels,
//! `fare.grand_total` for flights, ...). [`Quotation::to_document`] and
//! [`Quotation::from_document`] translate between the common model and that
//! stored shape.

use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotationKind {
    Hotel,
    Vehicle,
    Flight,
    Custom,
    Full,
    Quick,
}

impl QuotationKind {
    pub const ALL: [QuotationKind; 6] = [
        Self::Hotel,
        Self::Vehicle,
        Self::Flight,
        Self::Custom,
        Self::Full,
        Self::Quick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hotel => "hotel",
            Self::Vehicle => "vehicle",
            Self::Flight => "flight",
            Self::Custom => "custom",
            Self::Full => "full",
            Self::Quick => "quick",
        }
    }

    pub fn collection_name(&self) -> &'static str {
        match self {
            Self::Hotel => "hotel_quotations",
            Self::Vehicle => "vehicle_quotations",
            Self::Flight => "flight_quotations",
            Self::Custom => "custom_quotations",
            Self::Full => "full_quotations",
            Self::Quick => "quick_quotations",
        }
    }

    /// Dotted path of the total amount inside a stored quotation.
    pub fn total_field_path(&self) -> &'static str {
        match self {
            Self::Hotel => "pricing.total_amount",
            Self::Vehicle => "total_cost",
            Self::Flight => "fare.grand_total",
            Self::Custom => "summary.final_amount",
            Self::Full => "package.final_price",
            Self::Quick => "total_amount",
        }
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Hotel => "HQ",
            Self::Vehicle => "VQ",
            Self::Flight => "FQ",
            Self::Custom => "CQ",
            Self::Full => "FP",
            Self::Quick => "QQ",
        }
    }
}

impl std::fmt::Display for QuotationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QuotationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == s.to_lowercase())
            .copied()
            .ok_or_else(|| format!("Unknown quotation type: {}", s))
    }
}

/// How much of a quotation has been paid. Overpayment is reported, not blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
    Overpaid,
}

impl PaymentStatus {
    pub fn from_totals(total_amount: Decimal, total_paid: Decimal) -> Self {
        if total_paid <= Decimal::ZERO {
            Self::Unpaid
        } else if total_paid < total_amount {
            Self::Partial
        } else if total_paid == total_amount {
            Self::Paid
        } else {
            Self::Overpaid
        }
    }
}

#[derive(Debug, Clone)]
pub struct Quotation {
    pub quotation_id: String,
    pub kind: QuotationKind,
    pub client_name: String,
    pub total_amount: Decimal,
    /// Sum of the payment links for this quotation, rewritten on every
    /// allocation change.
    pub total_paid: Decimal,
    pub details: serde_json::Value,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn new(kind: QuotationKind, input: NewQuotation, created_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            quotation_id: String::new(),
            kind,
            client_name: input.client_name,
            total_amount: input.total_amount,
            total_paid: Decimal::ZERO,
            details: input.details.unwrap_or(serde_json::Value::Null),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn balance_due(&self) -> Decimal {
        (self.total_amount - self.total_paid).max(Decimal::ZERO)
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_totals(self.total_amount, self.total_paid)
    }

    /// Stored shape of this quotation in its variant's collection.
    pub fn to_document(&self) -> Result<Document, bson::ser::Error> {
        let mut document = doc! {
            "_id": self.quotation_id.clone(),
            "quotation_id": self.quotation_id.clone(),
            "client_name": self.client_name.clone(),
            "total_paid": self.total_paid.to_string(),
            "details": bson::to_bson(&self.details)?,
            "created_by": self.created_by.clone(),
            "created_at": bson::DateTime::from_chrono(self.created_at),
            "updated_at": bson::DateTime::from_chrono(self.updated_at),
        };
        set_path(
            &mut document,
            self.kind.total_field_path(),
            Bson::String(self.total_amount.to_string()),
        );
        Ok(document)
    }

    pub fn from_document(kind: QuotationKind, document: &Document) -> anyhow::Result<Self> {
        let quotation_id = document
            .get_str("quotation_id")
            .or_else(|_| document.get_str("_id"))
            .map_err(|_| anyhow::anyhow!("Quotation document has no id"))?
            .to_string();

        let total_amount = get_path(document, kind.total_field_path())
            .and_then(decimal_from_bson)
            .unwrap_or(Decimal::ZERO);
        let total_paid = document
            .get("total_paid")
            .and_then(decimal_from_bson)
            .unwrap_or(Decimal::ZERO);

        let details = document
            .get("details")
            .cloned()
            .map(Bson::into_relaxed_extjson)
            .unwrap_or(serde_json::Value::Null);

        let timestamp = |key: &str| {
            document
                .get_datetime(key)
                .map(|dt| dt.to_chrono())
                .unwrap_or_else(|_| Utc::now())
        };

        Ok(Self {
            quotation_id,
            kind,
            client_name: document.get_str("client_name").unwrap_or_default().to_string(),
            total_amount,
            total_paid,
            details,
            created_by: document.get_str("created_by").ok().map(str::to_string),
            created_at: timestamp("created_at"),
            updated_at: timestamp("updated_at"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewQuotation {
    pub client_name: String,
    pub total_amount: Decimal,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct QuotationUpdate {
    pub client_name: Option<String>,
    pub total_amount: Option<Decimal>,
    pub details: Option<serde_json::Value>,
}

impl QuotationUpdate {
    pub fn apply(&self, quotation: &mut Quotation) {
        if let Some(name) = &self.client_name {
            quotation.client_name = name.clone();
        }
        if let Some(total) = self.total_amount {
            quotation.total_amount = total;
        }
        if let Some(details) = &self.details {
            quotation.details = details.clone();
        }
        quotation.updated_at = Utc::now();
    }
}

/// Write `value` at a dotted path, creating intermediate documents.
pub fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        None => document.get(path),
        Some((head, rest)) => match document.get(head) {
            Some(Bson::Document(inner)) => get_path(inner, rest),
            _ => None,
        },
    }
}

/// Read a monetary value whichever way it was stored.
pub fn decimal_from_bson(value: &Bson) -> Option<Decimal> {
    match value {
        Bson::String(s) => Decimal::from_str(s).ok(),
        Bson::Int32(i) => Some(Decimal::from(*i)),
        Bson::Int64(i) => Some(Decimal::from(*i)),
        Bson::Double(f) => Decimal::try_from(*f).ok(),
        _ => None,
    }
}
