//! Domain models for voucher-service.

mod payment_link;
mod quotation;
mod voucher;

pub use payment_link::{AllocationOutcome, NewAllocation, PaymentLink};
pub use quotation::{
    decimal_from_bson, get_path, set_path, NewQuotation, PaymentStatus, Quotation, QuotationKind,
    QuotationUpdate,
};
pub use voucher::{NewVoucher, Voucher, VoucherCorrection, VoucherFilter, VoucherType};
