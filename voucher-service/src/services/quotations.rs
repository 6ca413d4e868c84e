use crate::models::{NewQuotation, Quotation, QuotationKind, QuotationUpdate};
use crate::services::metrics;
use crate::services::sequence::{
    format_id, insert_with_next_id, next_sequence, quotation_id_prefix, QUOTATION_SEQ_WIDTH,
};
use crate::services::store::{Page, VoucherStore};
use crate::services::ServiceError;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct QuotationService {
    store: Arc<dyn VoucherStore>,
}

impl QuotationService {
    pub fn new(store: Arc<dyn VoucherStore>) -> Self {
        Self { store }
    }

    /// Store a quotation under the next `{PREFIX}-{YYMM}-{NNNN}` id of its variant.
    ///
    /// A taken id moves on to the following sequence number; after
    /// repeated collisions the request fails.
    #[instrument(skip(self, input), fields(kind = %kind))]
    pub async fn create_quotation(
        &self,
        kind: QuotationKind,
        input: NewQuotation,
        actor: Option<String>,
    ) -> Result<Quotation, ServiceError> {
        let template = Quotation::new(kind, input, actor);
        let prefix = quotation_id_prefix(kind, template.created_at);
        let last = self.store.last_quotation_id(kind, &prefix).await?;
        let first = next_sequence(&prefix, last.as_deref());

        let quotation = insert_with_next_id("quotation", first, |seq| {
            let store = self.store.clone();
            let mut quotation = template.clone();
            quotation.quotation_id = format_id(&prefix, seq, QUOTATION_SEQ_WIDTH);
            async move { store.insert_quotation(&quotation).await.map(|_| quotation) }
        })
        .await?;

        metrics::record_quotation_created(kind.as_str());
        info!(
            quotation_id = %quotation.quotation_id,
            total_amount = %quotation.total_amount,
            "Quotation created"
        );
        Ok(quotation)
    }

    pub async fn get_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Quotation, ServiceError> {
        self.store
            .get_quotation(kind, quotation_id)
            .await?
            .ok_or(ServiceError::QuotationNotFound)
    }

    pub async fn list_quotations(
        &self,
        kind: QuotationKind,
        page: Page,
    ) -> Result<(Vec<Quotation>, u64), ServiceError> {
        self.store.list_quotations(kind, page).await
    }

    /// Change the commercial fields of a quotation. The paid total is left
    /// as is; its payment status follows from the new total.
    #[instrument(skip(self, update))]
    pub async fn update_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
        update: QuotationUpdate,
    ) -> Result<Quotation, ServiceError> {
        let quotation = self
            .store
            .update_quotation(kind, quotation_id, &update)
            .await?;
        info!(
            total_amount = %quotation.total_amount,
            total_paid = %quotation.total_paid,
            "Quotation updated"
        );
        Ok(quotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryStore;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn input() -> NewQuotation {
        NewQuotation {
            client_name: "S. Menon".to_string(),
            total_amount: dec!(18200),
            details: None,
        }
    }

    #[tokio::test]
    async fn ids_follow_variant_prefix_and_month() {
        let service = QuotationService::new(Arc::new(InMemoryStore::new()));
        let prefix = quotation_id_prefix(QuotationKind::Flight, Utc::now());

        let first = service
            .create_quotation(QuotationKind::Flight, input(), None)
            .await
            .unwrap();
        let second = service
            .create_quotation(QuotationKind::Flight, input(), None)
            .await
            .unwrap();

        assert_eq!(first.quotation_id, format!("{}0001", prefix));
        assert_eq!(second.quotation_id, format!("{}0002", prefix));
    }

    #[tokio::test]
    async fn legacy_ids_do_not_reset_numbering() {
        let store = Arc::new(InMemoryStore::new());
        let prefix = quotation_id_prefix(QuotationKind::Hotel, Utc::now());

        for suffix in ["0001", "0002", "00ZZ"] {
            let mut existing = Quotation::new(QuotationKind::Hotel, input(), None);
            existing.quotation_id = format!("{}{}", prefix, suffix);
            store.insert_quotation(&existing).await.unwrap();
        }

        let service = QuotationService::new(store);
        let created = service
            .create_quotation(QuotationKind::Hotel, input(), None)
            .await
            .unwrap();
        assert_eq!(created.quotation_id, format!("{}0003", prefix));
    }

    #[tokio::test]
    async fn numbering_continues_past_9999() {
        let store = Arc::new(InMemoryStore::new());
        let prefix = quotation_id_prefix(QuotationKind::Quick, Utc::now());

        let mut existing = Quotation::new(QuotationKind::Quick, input(), None);
        existing.quotation_id = format!("{}9999", prefix);
        store.insert_quotation(&existing).await.unwrap();

        let service = QuotationService::new(store);
        for n in 10000..10008 {
            let created = service
                .create_quotation(QuotationKind::Quick, input(), None)
                .await
                .unwrap();
            assert_eq!(created.quotation_id, format!("{}{}", prefix, n));
        }
    }

    #[tokio::test]
    async fn update_keeps_paid_total() {
        let service = QuotationService::new(Arc::new(InMemoryStore::new()));
        let created = service
            .create_quotation(QuotationKind::Custom, input(), None)
            .await
            .unwrap();

        let updated = service
            .update_quotation(
                QuotationKind::Custom,
                &created.quotation_id,
                QuotationUpdate {
                    total_amount: Some(dec!(19000)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_amount, dec!(19000));
        assert_eq!(updated.total_paid, dec!(0));
        assert_eq!(updated.client_name, "S. Menon");
    }
}
