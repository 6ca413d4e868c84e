use crate::models::{NewVoucher, Voucher, VoucherCorrection, VoucherFilter};
use crate::services::metrics;
use crate::services::sequence::{
    format_id, insert_with_next_id, next_sequence, voucher_no_prefix, VOUCHER_NO_WIDTH,
};
use crate::services::store::{Page, VoucherStore};
use crate::services::ServiceError;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct VoucherService {
    store: Arc<dyn VoucherStore>,
}

impl VoucherService {
    pub fn new(store: Arc<dyn VoucherStore>) -> Self {
        Self { store }
    }

    /// Record a voucher under the next free number of its type.
    #[instrument(
        skip(self, input),
        fields(voucher_type = %input.voucher_type, party = %input.party)
    )]
    pub async fn create_voucher(
        &self,
        input: NewVoucher,
        actor: Option<String>,
    ) -> Result<Voucher, ServiceError> {
        if input.amount <= Decimal::ZERO {
            return Err(ServiceError::NonPositiveAmount);
        }

        let prefix = voucher_no_prefix(input.voucher_type);
        let last = self.store.last_voucher_no(input.voucher_type).await?;
        let first = next_sequence(prefix, last.as_deref());

        let voucher = insert_with_next_id("voucher", first, |seq| {
            let store = self.store.clone();
            let voucher = Voucher::new(
                input.clone(),
                format_id(prefix, seq, VOUCHER_NO_WIDTH),
                actor.clone(),
            );
            async move { store.insert_voucher(&voucher).await.map(|_| voucher) }
        })
        .await?;

        metrics::record_voucher_created(voucher.voucher_type.as_str());
        info!(
            voucher_id = %voucher.id,
            voucher_no = %voucher.voucher_no,
            amount = %voucher.amount,
            "Voucher recorded"
        );
        Ok(voucher)
    }

    pub async fn get_voucher(&self, id: &str) -> Result<Voucher, ServiceError> {
        self.store
            .get_voucher(id)
            .await?
            .ok_or(ServiceError::VoucherNotFound)
    }

    pub async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        page: Page,
    ) -> Result<(Vec<Voucher>, u64), ServiceError> {
        self.store.list_vouchers(filter, Some(page)).await
    }

    #[instrument(skip(self, correction))]
    pub async fn correct_voucher(
        &self,
        id: &str,
        correction: VoucherCorrection,
    ) -> Result<Voucher, ServiceError> {
        let voucher = self.store.correct_voucher(id, &correction).await?;
        info!(
            voucher_no = %voucher.voucher_no,
            amount = %voucher.amount,
            allocated = %voucher.allocated_amount,
            "Voucher corrected"
        );
        Ok(voucher)
    }

    #[instrument(skip(self))]
    pub async fn delete_voucher(&self, id: &str) -> Result<(), ServiceError> {
        self.store.delete_voucher(id).await?;
        info!("Voucher deleted");
        Ok(())
    }
}
