use rust_decimal::Decimal;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Voucher not found")]
    VoucherNotFound,

    #[error("Quotation not found")]
    QuotationNotFound,

    #[error("Payment link not found")]
    LinkNotFound,

    #[error("Voucher is already linked to this quotation")]
    DuplicateLink,

    #[error("Allocation of {requested} exceeds available voucher balance of {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Voucher amount {amount} is below the {allocated} already allocated")]
    AmountBelowAllocated { amount: Decimal, allocated: Decimal },

    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Allocated total is too large to represent")]
    AmountOverflow,

    #[error("Voucher has payment links and cannot be deleted")]
    VoucherInUse,

    #[error("Identifier {0} is already taken")]
    DuplicateKey(String),

    #[error("Could not allocate a unique identifier after {0} attempts")]
    IdentifierExhausted(u32),
}

impl From<mongodb::bson::ser::Error> for ServiceError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        ServiceError::Internal(anyhow::anyhow!("Serialization error: {}", err))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(e.into()),
            ServiceError::Internal(e) => AppError::InternalError(e),
            e @ (ServiceError::VoucherNotFound
            | ServiceError::QuotationNotFound
            | ServiceError::LinkNotFound) => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            e @ (ServiceError::InsufficientBalance { .. }
            | ServiceError::AmountBelowAllocated { .. }
            | ServiceError::NonPositiveAmount
            | ServiceError::AmountOverflow) => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            e @ (ServiceError::DuplicateLink
            | ServiceError::VoucherInUse
            | ServiceError::DuplicateKey(_)
            | ServiceError::IdentifierExhausted(_)) => {
                AppError::Conflict(anyhow::anyhow!(e.to_string()))
            }
        }
    }
}
