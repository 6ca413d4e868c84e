pub mod allocations;
pub mod health;
pub mod quotations;
pub mod vouchers;

pub use allocations::{create_allocation, delete_allocation, update_allocation};
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use quotations::{
    create_quotation, get_quotation, get_quotation_payments, list_quotations,
    recompute_quotation_total, update_quotation,
};
pub use vouchers::{
    correct_voucher, create_voucher, delete_voucher, get_voucher, get_voucher_allocations,
    list_available_vouchers, list_vouchers,
};
