//! Allocation engine: attributes voucher amounts to quotations and keeps the
//! running balances on both sides consistent.
//!
//! The arithmetic lives in free functions so every store applies exactly the
//! same rules inside its own atomic section.

use crate::models::{
    AllocationOutcome, NewAllocation, PaymentLink, Quotation, QuotationKind, Voucher,
    VoucherFilter, VoucherType,
};
use crate::services::metrics;
use crate::services::store::VoucherStore;
use crate::services::ServiceError;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Total of the given links, or [`ServiceError::AmountOverflow`] when it
/// does not fit in a `Decimal`.
pub fn sum_allocations<'a>(
    links: impl IntoIterator<Item = &'a PaymentLink>,
) -> Result<Decimal, ServiceError> {
    links
        .into_iter()
        .try_fold(Decimal::ZERO, |total, link| {
            total.checked_add(link.allocated_amount)
        })
        .ok_or(ServiceError::AmountOverflow)
}

/// Validate `amount` against the voucher's remaining balance.
///
/// `links` are the voucher's current links; `exclude_link` is left out of the
/// committed total so a link can be resized against its own share. Returns
/// the voucher's allocated total once `amount` is applied.
pub fn check_allocation(
    voucher: &Voucher,
    links: &[PaymentLink],
    amount: Decimal,
    exclude_link: Option<&str>,
) -> Result<Decimal, ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::NonPositiveAmount);
    }

    let committed = sum_allocations(
        links
            .iter()
            .filter(|link| link.voucher_id == voucher.id)
            .filter(|link| Some(link.id.as_str()) != exclude_link),
    )?;
    let available = voucher.amount - committed;

    if amount > available {
        return Err(ServiceError::InsufficientBalance {
            requested: amount,
            available: available.max(Decimal::ZERO),
        });
    }

    committed
        .checked_add(amount)
        .ok_or(ServiceError::AmountOverflow)
}

/// A voucher amount may be corrected down only as far as what is allocated.
pub fn check_correction(new_amount: Decimal, allocated: Decimal) -> Result<(), ServiceError> {
    if new_amount <= Decimal::ZERO {
        return Err(ServiceError::NonPositiveAmount);
    }
    if new_amount < allocated {
        return Err(ServiceError::AmountBelowAllocated {
            amount: new_amount,
            allocated,
        });
    }
    Ok(())
}

/// Criteria for vouchers that can still fund a quotation.
#[derive(Debug, Clone, Default)]
pub struct AvailableVoucherQuery {
    pub voucher_type: Option<VoucherType>,
    pub party: Option<String>,
    /// Leave out vouchers already linked to this quotation.
    pub exclude_quotation: Option<(QuotationKind, String)>,
}

/// A quotation with every payment attributed to it.
#[derive(Debug, Clone)]
pub struct QuotationPayments {
    pub quotation: Quotation,
    pub payments: Vec<(PaymentLink, Option<Voucher>)>,
}

#[derive(Clone)]
pub struct AllocationService {
    store: Arc<dyn VoucherStore>,
}

impl AllocationService {
    pub fn new(store: Arc<dyn VoucherStore>) -> Self {
        Self { store }
    }

    #[instrument(
        skip(self, input),
        fields(
            voucher_id = %input.voucher_id,
            quotation_id = %input.quotation_id,
            quotation_type = %input.quotation_type
        )
    )]
    pub async fn link(
        &self,
        input: NewAllocation,
        actor: Option<String>,
    ) -> Result<AllocationOutcome, ServiceError> {
        let amount = input.amount;
        let link = PaymentLink::new(input, actor);

        match self.store.allocate(link).await {
            Ok(outcome) => {
                metrics::record_allocation("link", "ok");
                info!(
                    link_id = %outcome.link.id,
                    amount = %amount,
                    voucher_available = %outcome.voucher_available,
                    quotation_total_paid = %outcome.quotation_total_paid,
                    "Voucher allocated to quotation"
                );
                Ok(outcome)
            }
            Err(e) => {
                metrics::record_allocation("link", outcome_label(&e));
                warn!(amount = %amount, error = %e, "Allocation rejected");
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn update_link(
        &self,
        link_id: &str,
        amount: Decimal,
    ) -> Result<AllocationOutcome, ServiceError> {
        match self.store.update_allocation(link_id, amount).await {
            Ok(outcome) => {
                metrics::record_allocation("update", "ok");
                info!(
                    voucher_id = %outcome.link.voucher_id,
                    voucher_available = %outcome.voucher_available,
                    quotation_total_paid = %outcome.quotation_total_paid,
                    "Allocation amount updated"
                );
                Ok(outcome)
            }
            Err(e) => {
                metrics::record_allocation("update", outcome_label(&e));
                warn!(error = %e, "Allocation update rejected");
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn unlink(&self, link_id: &str) -> Result<AllocationOutcome, ServiceError> {
        let outcome = self.store.release_allocation(link_id).await.inspect_err(|e| {
            metrics::record_allocation("unlink", outcome_label(e));
        })?;
        metrics::record_allocation("unlink", "ok");
        info!(
            voucher_id = %outcome.link.voucher_id,
            released = %outcome.link.allocated_amount,
            voucher_available = %outcome.voucher_available,
            "Allocation released"
        );
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn recompute_quotation_total(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Decimal, ServiceError> {
        let total = self
            .store
            .recompute_quotation_total(kind, quotation_id)
            .await?;
        info!(total_paid = %total, "Quotation paid total recomputed");
        Ok(total)
    }

    #[instrument(skip(self))]
    pub async fn quotation_payments(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<QuotationPayments, ServiceError> {
        let quotation = self
            .store
            .get_quotation(kind, quotation_id)
            .await?
            .ok_or(ServiceError::QuotationNotFound)?;

        let links = self.store.links_for_quotation(kind, quotation_id).await?;
        let voucher_ids: Vec<String> = links
            .iter()
            .map(|link| link.voucher_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let vouchers: HashMap<String, Voucher> = self
            .store
            .vouchers_by_ids(&voucher_ids)
            .await?
            .into_iter()
            .map(|v| (v.id.clone(), v))
            .collect();

        let payments = links
            .into_iter()
            .map(|link| {
                let voucher = vouchers.get(&link.voucher_id).cloned();
                (link, voucher)
            })
            .collect();

        Ok(QuotationPayments {
            quotation,
            payments,
        })
    }

    /// Vouchers with money left to allocate, newest first.
    #[instrument(skip(self))]
    pub async fn search_available_vouchers(
        &self,
        query: &AvailableVoucherQuery,
    ) -> Result<Vec<Voucher>, ServiceError> {
        let excluded: HashSet<String> = match &query.exclude_quotation {
            Some((kind, quotation_id)) => self
                .store
                .links_for_quotation(*kind, quotation_id)
                .await?
                .into_iter()
                .map(|link| link.voucher_id)
                .collect(),
            None => HashSet::new(),
        };

        let filter = VoucherFilter {
            voucher_type: query.voucher_type,
            party: query.party.clone(),
            available_only: true,
        };
        let (vouchers, _) = self.store.list_vouchers(&filter, None).await?;

        let mut available: Vec<Voucher> = vouchers
            .into_iter()
            .filter(|v| v.available_balance() > Decimal::ZERO)
            .filter(|v| !excluded.contains(&v.id))
            .collect();
        available.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));

        Ok(available)
    }

    #[instrument(skip(self))]
    pub async fn voucher_allocations(
        &self,
        voucher_id: &str,
    ) -> Result<(Voucher, Vec<PaymentLink>), ServiceError> {
        let voucher = self
            .store
            .get_voucher(voucher_id)
            .await?
            .ok_or(ServiceError::VoucherNotFound)?;
        let links = self.store.links_for_voucher(voucher_id).await?;
        Ok((voucher, links))
    }
}

fn outcome_label(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::InsufficientBalance { .. } => "insufficient_balance",
        ServiceError::DuplicateLink => "duplicate",
        ServiceError::VoucherNotFound
        | ServiceError::QuotationNotFound
        | ServiceError::LinkNotFound => "not_found",
        ServiceError::NonPositiveAmount | ServiceError::AmountOverflow => "invalid_amount",
        _ => "error",
    }
}
