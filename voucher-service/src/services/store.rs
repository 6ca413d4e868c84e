//! Persistence seam for vouchers, quotations and payment links.
//!
//! Every method that changes an allocation (`allocate`, `update_allocation`,
//! `release_allocation`, `recompute_quotation_total`, `correct_voucher`,
//! `delete_voucher`) is atomic: the balance check, the link write, the
//! voucher's `allocated_amount` and the quotation's `total_paid` move
//! together or not at all.

use crate::models::{
    AllocationOutcome, PaymentLink, Quotation, QuotationKind, QuotationUpdate, Voucher,
    VoucherCorrection, VoucherFilter, VoucherType,
};
use crate::services::ServiceError;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// One page of a listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub page_size: u64,
}

impl Page {
    pub const DEFAULT_SIZE: u64 = 20;
    pub const MAX_SIZE: u64 = 100;

    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_SIZE)
                .clamp(1, Self::MAX_SIZE),
        }
    }

    /// Documents before this page. Saturates at `i64::MAX`, the largest
    /// skip the database accepts.
    pub fn skip(&self) -> u64 {
        (self.page - 1)
            .saturating_mul(self.page_size)
            .min(i64::MAX as u64)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
pub trait VoucherStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    // Vouchers

    /// Fails with [`ServiceError::DuplicateKey`] when the voucher number is taken.
    async fn insert_voucher(&self, voucher: &Voucher) -> Result<(), ServiceError>;
    /// Voucher number of this type with the highest sequence number.
    async fn last_voucher_no(
        &self,
        voucher_type: VoucherType,
    ) -> Result<Option<String>, ServiceError>;
    async fn get_voucher(&self, id: &str) -> Result<Option<Voucher>, ServiceError>;
    async fn vouchers_by_ids(&self, ids: &[String]) -> Result<Vec<Voucher>, ServiceError>;
    /// Newest first. `None` returns every match.
    async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        page: Option<Page>,
    ) -> Result<(Vec<Voucher>, u64), ServiceError>;
    async fn correct_voucher(
        &self,
        id: &str,
        correction: &VoucherCorrection,
    ) -> Result<Voucher, ServiceError>;
    async fn delete_voucher(&self, id: &str) -> Result<(), ServiceError>;

    // Quotations

    /// Fails with [`ServiceError::DuplicateKey`] when the quotation id is taken.
    async fn insert_quotation(&self, quotation: &Quotation) -> Result<(), ServiceError>;
    /// Quotation id of this variant under `prefix` with the highest sequence number.
    async fn last_quotation_id(
        &self,
        kind: QuotationKind,
        prefix: &str,
    ) -> Result<Option<String>, ServiceError>;
    async fn get_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Option<Quotation>, ServiceError>;
    async fn list_quotations(
        &self,
        kind: QuotationKind,
        page: Page,
    ) -> Result<(Vec<Quotation>, u64), ServiceError>;
    async fn update_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
        update: &QuotationUpdate,
    ) -> Result<Quotation, ServiceError>;

    // Payment links

    async fn allocate(&self, link: PaymentLink) -> Result<AllocationOutcome, ServiceError>;
    async fn update_allocation(
        &self,
        link_id: &str,
        amount: Decimal,
    ) -> Result<AllocationOutcome, ServiceError>;
    async fn release_allocation(&self, link_id: &str) -> Result<AllocationOutcome, ServiceError>;
    /// Rewrite the quotation's `total_paid` from its links and return it.
    async fn recompute_quotation_total(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Decimal, ServiceError>;
    async fn links_for_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Vec<PaymentLink>, ServiceError>;
    async fn links_for_voucher(&self, voucher_id: &str) -> Result<Vec<PaymentLink>, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        let page = Page::new(Some(0), Some(1000));
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, Page::MAX_SIZE);
        assert_eq!(page.skip(), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Page::new(Some(3), Some(20));
        assert_eq!(page.skip(), 40);
        assert_eq!(page.total_pages(41), 3);
        assert_eq!(page.total_pages(0), 0);
    }

    #[test]
    fn far_pages_do_not_overflow() {
        let page = Page::new(Some(u64::MAX), Some(100));
        assert_eq!(page.skip(), i64::MAX as u64);
        assert_eq!(Page::new(Some(u64::MAX), Some(1)).skip(), i64::MAX as u64);
    }
}
