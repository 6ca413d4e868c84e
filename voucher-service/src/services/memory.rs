use crate::models::{
    AllocationOutcome, PaymentLink, Quotation, QuotationKind, QuotationUpdate, Voucher,
    VoucherCorrection, VoucherFilter, VoucherType,
};
use crate::services::allocation::{check_allocation, check_correction, sum_allocations};
use crate::services::sequence::{highest_id, voucher_no_prefix};
use crate::services::store::{Page, VoucherStore};
use crate::services::ServiceError;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct State {
    vouchers: Vec<Voucher>,
    quotations: Vec<Quotation>,
    links: Vec<PaymentLink>,
}

impl State {
    fn voucher_mut(&mut self, id: &str) -> Result<&mut Voucher, ServiceError> {
        self.vouchers
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(ServiceError::VoucherNotFound)
    }

    fn quotation_mut(
        &mut self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<&mut Quotation, ServiceError> {
        self.quotations
            .iter_mut()
            .find(|q| q.kind == kind && q.quotation_id == quotation_id)
            .ok_or(ServiceError::QuotationNotFound)
    }

    fn voucher_links(&self, voucher_id: &str) -> Vec<PaymentLink> {
        self.links
            .iter()
            .filter(|l| l.voucher_id == voucher_id)
            .cloned()
            .collect()
    }

    /// Rewrite the denormalized totals on both sides of a link. Both sums
    /// are computed before anything is written, so an error leaves the
    /// totals untouched.
    fn settle(
        &mut self,
        voucher_id: &str,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<(Decimal, Decimal), ServiceError> {
        let allocated =
            sum_allocations(self.links.iter().filter(|l| l.voucher_id == voucher_id))?;
        let paid = sum_allocations(self.links.iter().filter(|l| l.is_for(kind, quotation_id)))?;
        let now = Utc::now();

        let voucher = self.voucher_mut(voucher_id)?;
        voucher.set_allocated(allocated);
        voucher.updated_at = now;
        let available = voucher.available_balance();

        // A quotation removed out of band must not block releasing its links.
        if let Ok(quotation) = self.quotation_mut(kind, quotation_id) {
            quotation.total_paid = paid;
            quotation.updated_at = now;
        }

        Ok((available, paid))
    }
}

/// Store kept in process memory. Every mutation runs under one lock, so the
/// allocation rules hold under any interleaving of requests.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ServiceError> {
        self.state
            .lock()
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("In-memory store lock poisoned")))
    }
}

#[async_trait]
impl VoucherStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }

    async fn insert_voucher(&self, voucher: &Voucher) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if state
            .vouchers
            .iter()
            .any(|v| v.voucher_no == voucher.voucher_no)
        {
            return Err(ServiceError::DuplicateKey(voucher.voucher_no.clone()));
        }
        state.vouchers.push(voucher.clone());
        Ok(())
    }

    async fn last_voucher_no(
        &self,
        voucher_type: VoucherType,
    ) -> Result<Option<String>, ServiceError> {
        let state = self.lock()?;
        let numbers = state
            .vouchers
            .iter()
            .filter(|v| v.voucher_type == voucher_type)
            .map(|v| v.voucher_no.as_str());
        Ok(highest_id(voucher_no_prefix(voucher_type), numbers).map(str::to_string))
    }

    async fn get_voucher(&self, id: &str) -> Result<Option<Voucher>, ServiceError> {
        let state = self.lock()?;
        Ok(state.vouchers.iter().find(|v| v.id == id).cloned())
    }

    async fn vouchers_by_ids(&self, ids: &[String]) -> Result<Vec<Voucher>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .vouchers
            .iter()
            .filter(|v| ids.contains(&v.id))
            .cloned()
            .collect())
    }

    async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        page: Option<Page>,
    ) -> Result<(Vec<Voucher>, u64), ServiceError> {
        let state = self.lock()?;
        let matching: Vec<Voucher> = state
            .vouchers
            .iter()
            .rev()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect();
        let total = matching.len() as u64;

        let items = match page {
            Some(page) => matching
                .into_iter()
                .skip(page.skip() as usize)
                .take(page.page_size as usize)
                .collect(),
            None => matching,
        };
        Ok((items, total))
    }

    async fn correct_voucher(
        &self,
        id: &str,
        correction: &VoucherCorrection,
    ) -> Result<Voucher, ServiceError> {
        let mut state = self.lock()?;
        let voucher = state.voucher_mut(id)?;
        if let Some(amount) = correction.amount {
            check_correction(amount, voucher.allocated_amount)?;
        }
        correction.apply(voucher);
        Ok(voucher.clone())
    }

    async fn delete_voucher(&self, id: &str) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let position = state
            .vouchers
            .iter()
            .position(|v| v.id == id)
            .ok_or(ServiceError::VoucherNotFound)?;
        if state.links.iter().any(|l| l.voucher_id == id) {
            return Err(ServiceError::VoucherInUse);
        }
        state.vouchers.remove(position);
        Ok(())
    }

    async fn insert_quotation(&self, quotation: &Quotation) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if state
            .quotations
            .iter()
            .any(|q| q.kind == quotation.kind && q.quotation_id == quotation.quotation_id)
        {
            return Err(ServiceError::DuplicateKey(quotation.quotation_id.clone()));
        }
        state.quotations.push(quotation.clone());
        Ok(())
    }

    async fn last_quotation_id(
        &self,
        kind: QuotationKind,
        prefix: &str,
    ) -> Result<Option<String>, ServiceError> {
        let state = self.lock()?;
        let ids = state
            .quotations
            .iter()
            .filter(|q| q.kind == kind)
            .map(|q| q.quotation_id.as_str());
        Ok(highest_id(prefix, ids).map(str::to_string))
    }

    async fn get_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Option<Quotation>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .quotations
            .iter()
            .find(|q| q.kind == kind && q.quotation_id == quotation_id)
            .cloned())
    }

    async fn list_quotations(
        &self,
        kind: QuotationKind,
        page: Page,
    ) -> Result<(Vec<Quotation>, u64), ServiceError> {
        let state = self.lock()?;
        let total = state.quotations.iter().filter(|q| q.kind == kind).count() as u64;
        let items = state
            .quotations
            .iter()
            .rev()
            .filter(|q| q.kind == kind)
            .skip(page.skip() as usize)
            .take(page.page_size as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }

    async fn update_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
        update: &QuotationUpdate,
    ) -> Result<Quotation, ServiceError> {
        let mut state = self.lock()?;
        let quotation = state.quotation_mut(kind, quotation_id)?;
        update.apply(quotation);
        Ok(quotation.clone())
    }

    async fn allocate(&self, link: PaymentLink) -> Result<AllocationOutcome, ServiceError> {
        let mut state = self.lock()?;

        let voucher = state.voucher_mut(&link.voucher_id)?.clone();
        state.quotation_mut(link.quotation_type, &link.quotation_id)?;

        let voucher_links = state.voucher_links(&voucher.id);
        if voucher_links
            .iter()
            .any(|l| l.is_for(link.quotation_type, &link.quotation_id))
        {
            return Err(ServiceError::DuplicateLink);
        }
        check_allocation(&voucher, &voucher_links, link.allocated_amount, None)?;

        state.links.push(link.clone());
        let (voucher_available, quotation_total_paid) =
            match state.settle(&link.voucher_id, link.quotation_type, &link.quotation_id) {
                Ok(totals) => totals,
                Err(e) => {
                    state.links.pop();
                    return Err(e);
                }
            };

        Ok(AllocationOutcome {
            link,
            voucher_available,
            quotation_total_paid,
        })
    }

    async fn update_allocation(
        &self,
        link_id: &str,
        amount: Decimal,
    ) -> Result<AllocationOutcome, ServiceError> {
        let mut state = self.lock()?;

        let link = state
            .links
            .iter()
            .find(|l| l.id == link_id)
            .cloned()
            .ok_or(ServiceError::LinkNotFound)?;
        let voucher = state.voucher_mut(&link.voucher_id)?.clone();
        let voucher_links = state.voucher_links(&voucher.id);
        check_allocation(&voucher, &voucher_links, amount, Some(link_id))?;

        let previous = link.clone();
        let mut updated = link;
        if let Some(stored) = state.links.iter_mut().find(|l| l.id == link_id) {
            stored.allocated_amount = amount;
            stored.updated_at = Utc::now();
            updated = stored.clone();
        }
        let settled = state.settle(
            &updated.voucher_id,
            updated.quotation_type,
            &updated.quotation_id,
        );
        let (voucher_available, quotation_total_paid) = match settled {
            Ok(totals) => totals,
            Err(e) => {
                if let Some(stored) = state.links.iter_mut().find(|l| l.id == link_id) {
                    *stored = previous;
                }
                return Err(e);
            }
        };

        Ok(AllocationOutcome {
            link: updated,
            voucher_available,
            quotation_total_paid,
        })
    }

    async fn release_allocation(&self, link_id: &str) -> Result<AllocationOutcome, ServiceError> {
        let mut state = self.lock()?;

        let position = state
            .links
            .iter()
            .position(|l| l.id == link_id)
            .ok_or(ServiceError::LinkNotFound)?;
        let link = state.links.remove(position);
        let (voucher_available, quotation_total_paid) =
            match state.settle(&link.voucher_id, link.quotation_type, &link.quotation_id) {
                Ok(totals) => totals,
                Err(e) => {
                    state.links.insert(position, link);
                    return Err(e);
                }
            };

        Ok(AllocationOutcome {
            link,
            voucher_available,
            quotation_total_paid,
        })
    }

    async fn recompute_quotation_total(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Decimal, ServiceError> {
        let mut state = self.lock()?;
        let paid = sum_allocations(state.links.iter().filter(|l| l.is_for(kind, quotation_id)))?;
        let quotation = state.quotation_mut(kind, quotation_id)?;
        quotation.total_paid = paid;
        quotation.updated_at = Utc::now();
        Ok(paid)
    }

    async fn links_for_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Vec<PaymentLink>, ServiceError> {
        let state = self.lock()?;
        Ok(state
            .links
            .iter()
            .filter(|l| l.is_for(kind, quotation_id))
            .cloned()
            .collect())
    }

    async fn links_for_voucher(&self, voucher_id: &str) -> Result<Vec<PaymentLink>, ServiceError> {
        let state = self.lock()?;
        Ok(state.voucher_links(voucher_id))
    }
}
