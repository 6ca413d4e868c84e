pub mod allocation;
pub mod database;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod mongo_store;
pub mod quotations;
pub mod sequence;
pub mod store;
pub mod vouchers;

pub use allocation::{AllocationService, AvailableVoucherQuery, QuotationPayments};
pub use database::MongoDb;
pub use error::ServiceError;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use mongo_store::MongoStore;
pub use quotations::QuotationService;
pub use store::{Page, VoucherStore};
pub use vouchers::VoucherService;
