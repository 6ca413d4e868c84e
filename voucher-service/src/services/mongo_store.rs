//! MongoDB-backed [`VoucherStore`].
//!
//! Allocation changes run inside a multi-document transaction that always
//! writes the voucher document. Two transactions touching the same voucher
//! therefore write-conflict; the loser is aborted by the server with a
//! `TransientTransactionError` label and replayed from the start, re-reading
//! the balance it checks against. Requires a replica set or sharded cluster.

use crate::models::{
    AllocationOutcome, PaymentLink, Quotation, QuotationKind, QuotationUpdate, Voucher,
    VoucherCorrection, VoucherFilter, VoucherType,
};
use crate::services::allocation::{check_allocation, check_correction, sum_allocations};
use crate::services::database::MongoDb;
use crate::services::sequence::voucher_no_prefix;
use crate::services::store::{Page, VoucherStore};
use crate::services::ServiceError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::{
    Error as MongoError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
    UNKNOWN_TRANSACTION_COMMIT_RESULT,
};
use mongodb::options::FindOptions;
use mongodb::ClientSession;
use rust_decimal::Decimal;
use tracing::{debug, warn};

const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoStore {
    db: MongoDb,
}

impl MongoStore {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    /// Run `op` in a transaction, replaying it on transient failures.
    async fn with_transaction<T, F>(&self, mut op: F) -> Result<T, ServiceError>
    where
        T: Send,
        F: for<'s> FnMut(&'s mut ClientSession) -> BoxFuture<'s, Result<T, ServiceError>> + Send,
    {
        let mut session = self.db.client().start_session(None).await?;
        let mut attempt = 1;

        loop {
            session.start_transaction(None).await?;

            let outcome = op(&mut session).await;
            let result = match outcome {
                Ok(value) => commit(&mut session).await.map(|_| value),
                Err(e) => {
                    if let Err(abort_err) = session.abort_transaction().await {
                        debug!(error = %abort_err, "Abort after failed transaction body");
                    }
                    Err(e)
                }
            };

            match result {
                Err(ServiceError::Database(e))
                    if e.contains_label(TRANSIENT_TRANSACTION_ERROR)
                        && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    warn!(attempt, error = %e, "Transient transaction error, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn voucher_in(
        &self,
        id: &str,
        session: &mut ClientSession,
    ) -> Result<Voucher, ServiceError> {
        self.db
            .vouchers()
            .find_one_with_session(doc! { "_id": id }, None, session)
            .await?
            .ok_or(ServiceError::VoucherNotFound)
    }

    async fn links_in(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<Vec<PaymentLink>, ServiceError> {
        let mut cursor = self
            .db
            .payment_links()
            .find_with_session(filter, None, &mut *session)
            .await?;
        let links = cursor.stream(session).try_collect().await?;
        Ok(links)
    }

    async fn ensure_quotation_in(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
        session: &mut ClientSession,
    ) -> Result<(), ServiceError> {
        self.db
            .quotations(kind)
            .find_one_with_session(doc! { "_id": quotation_id }, None, session)
            .await?
            .map(|_| ())
            .ok_or(ServiceError::QuotationNotFound)
    }

    /// Rewrite `allocated_amount` on the voucher and `total_paid` on the
    /// quotation from the links as they stand inside the transaction.
    async fn settle_in(
        &self,
        voucher: &Voucher,
        kind: QuotationKind,
        quotation_id: &str,
        session: &mut ClientSession,
    ) -> Result<(Decimal, Decimal), ServiceError> {
        let now = bson::DateTime::now();

        let voucher_links = self
            .links_in(doc! { "voucher_id": voucher.id.as_str() }, session)
            .await?;
        let allocated = sum_allocations(&voucher_links)?;
        self.db
            .vouchers()
            .update_one_with_session(
                doc! { "_id": voucher.id.as_str() },
                doc! { "$set": {
                    "allocated_amount": allocated.to_string(),
                    "fully_allocated": allocated >= voucher.amount,
                    "updated_at": now,
                } },
                None,
                session,
            )
            .await?;

        let paid = self.write_total_paid_in(kind, quotation_id, now, session).await?;
        Ok((voucher.amount - allocated, paid))
    }

    async fn write_total_paid_in(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
        now: bson::DateTime,
        session: &mut ClientSession,
    ) -> Result<Decimal, ServiceError> {
        let quotation_links = self
            .links_in(quotation_filter(kind, quotation_id), session)
            .await?;
        let paid = sum_allocations(&quotation_links)?;
        self.db
            .quotations(kind)
            .update_one_with_session(
                doc! { "_id": quotation_id },
                doc! { "$set": { "total_paid": paid.to_string(), "updated_at": now } },
                None,
                session,
            )
            .await?;
        Ok(paid)
    }

    async fn allocate_in(
        &self,
        link: PaymentLink,
        session: &mut ClientSession,
    ) -> Result<AllocationOutcome, ServiceError> {
        let voucher = self.voucher_in(&link.voucher_id, session).await?;
        self.ensure_quotation_in(link.quotation_type, &link.quotation_id, session)
            .await?;

        let voucher_links = self
            .links_in(doc! { "voucher_id": voucher.id.as_str() }, session)
            .await?;
        if voucher_links
            .iter()
            .any(|l| l.is_for(link.quotation_type, &link.quotation_id))
        {
            return Err(ServiceError::DuplicateLink);
        }
        check_allocation(&voucher, &voucher_links, link.allocated_amount, None)?;

        self.db
            .payment_links()
            .insert_one_with_session(&link, None, &mut *session)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    ServiceError::DuplicateLink
                } else {
                    ServiceError::Database(e)
                }
            })?;

        let (voucher_available, quotation_total_paid) = self
            .settle_in(&voucher, link.quotation_type, &link.quotation_id, session)
            .await?;

        Ok(AllocationOutcome {
            link,
            voucher_available,
            quotation_total_paid,
        })
    }

    async fn update_allocation_in(
        &self,
        link_id: &str,
        amount: Decimal,
        session: &mut ClientSession,
    ) -> Result<AllocationOutcome, ServiceError> {
        let mut link = self
            .db
            .payment_links()
            .find_one_with_session(doc! { "_id": link_id }, None, &mut *session)
            .await?
            .ok_or(ServiceError::LinkNotFound)?;
        let voucher = self.voucher_in(&link.voucher_id, session).await?;
        let voucher_links = self
            .links_in(doc! { "voucher_id": voucher.id.as_str() }, session)
            .await?;
        check_allocation(&voucher, &voucher_links, amount, Some(link_id))?;

        link.allocated_amount = amount;
        link.updated_at = chrono::Utc::now();
        self.db
            .payment_links()
            .update_one_with_session(
                doc! { "_id": link_id },
                doc! { "$set": {
                    "allocated_amount": amount.to_string(),
                    "updated_at": bson::DateTime::from_chrono(link.updated_at),
                } },
                None,
                &mut *session,
            )
            .await?;

        let (voucher_available, quotation_total_paid) = self
            .settle_in(&voucher, link.quotation_type, &link.quotation_id, session)
            .await?;

        Ok(AllocationOutcome {
            link,
            voucher_available,
            quotation_total_paid,
        })
    }

    async fn release_allocation_in(
        &self,
        link_id: &str,
        session: &mut ClientSession,
    ) -> Result<AllocationOutcome, ServiceError> {
        let link = self
            .db
            .payment_links()
            .find_one_with_session(doc! { "_id": link_id }, None, &mut *session)
            .await?
            .ok_or(ServiceError::LinkNotFound)?;
        let voucher = self.voucher_in(&link.voucher_id, session).await?;

        self.db
            .payment_links()
            .delete_one_with_session(doc! { "_id": link_id }, None, &mut *session)
            .await?;

        let (voucher_available, quotation_total_paid) = self
            .settle_in(&voucher, link.quotation_type, &link.quotation_id, session)
            .await?;

        Ok(AllocationOutcome {
            link,
            voucher_available,
            quotation_total_paid,
        })
    }

    async fn correct_voucher_in(
        &self,
        id: &str,
        correction: &VoucherCorrection,
        session: &mut ClientSession,
    ) -> Result<Voucher, ServiceError> {
        let mut voucher = self.voucher_in(id, session).await?;
        if let Some(amount) = correction.amount {
            check_correction(amount, voucher.allocated_amount)?;
        }
        correction.apply(&mut voucher);
        self.db
            .vouchers()
            .replace_one_with_session(doc! { "_id": id }, &voucher, None, session)
            .await?;
        Ok(voucher)
    }

    async fn delete_voucher_in(
        &self,
        id: &str,
        session: &mut ClientSession,
    ) -> Result<(), ServiceError> {
        self.voucher_in(id, session).await?;
        let links = self
            .db
            .payment_links()
            .count_documents_with_session(doc! { "voucher_id": id }, None, &mut *session)
            .await?;
        if links > 0 {
            return Err(ServiceError::VoucherInUse);
        }
        self.db
            .vouchers()
            .delete_one_with_session(doc! { "_id": id }, None, session)
            .await?;
        Ok(())
    }

    async fn recompute_in(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
        session: &mut ClientSession,
    ) -> Result<Decimal, ServiceError> {
        self.ensure_quotation_in(kind, quotation_id, session).await?;
        self.write_total_paid_in(kind, quotation_id, bson::DateTime::now(), session)
            .await
    }
}

async fn commit(session: &mut ClientSession) -> Result<(), ServiceError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_TRANSACTION_ATTEMPTS =>
            {
                warn!(attempt, error = %e, "Commit result unknown, retrying commit");
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub(crate) fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn quotation_filter(kind: QuotationKind, quotation_id: &str) -> Document {
    doc! { "quotation_type": kind.as_str(), "quotation_id": quotation_id }
}

/// Escape regex metacharacters so user input matches literally.
fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn voucher_filter_document(filter: &VoucherFilter) -> Document {
    let mut document = Document::new();
    if let Some(voucher_type) = filter.voucher_type {
        document.insert("voucher_type", voucher_type.as_str());
    }
    if let Some(party) = &filter.party {
        document.insert(
            "party",
            doc! { "$regex": escape_regex(party), "$options": "i" },
        );
    }
    if filter.available_only {
        document.insert("fully_allocated", doc! { "$ne": true });
    }
    document
}

/// Pipeline returning the document whose `field` is `prefix` plus the
/// largest number. Ids are strings, so ordering by length and then by
/// value gives numeric order.
fn highest_id_pipeline(mut filter: Document, field: &str, prefix: &str) -> Vec<Document> {
    filter.insert(field, doc! { "$regex": format!("^{}[0-9]+$", escape_regex(prefix)) });
    let path = format!("${}", field);
    vec![
        doc! { "$match": filter },
        doc! { "$project": { field: 1, "id_len": { "$strLenCP": path } } },
        doc! { "$sort": { "id_len": -1, field: -1 } },
        doc! { "$limit": 1 },
    ]
}

#[async_trait]
impl VoucherStore for MongoStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.db
            .health_check()
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e.to_string())))
    }

    async fn insert_voucher(&self, voucher: &Voucher) -> Result<(), ServiceError> {
        self.db
            .vouchers()
            .insert_one(voucher, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    ServiceError::DuplicateKey(voucher.voucher_no.clone())
                } else {
                    ServiceError::Database(e)
                }
            })?;
        Ok(())
    }

    async fn last_voucher_no(
        &self,
        voucher_type: VoucherType,
    ) -> Result<Option<String>, ServiceError> {
        let pipeline = highest_id_pipeline(
            doc! { "voucher_type": voucher_type.as_str() },
            "voucher_no",
            voucher_no_prefix(voucher_type),
        );
        let mut cursor = self.db.vouchers().aggregate(pipeline, None).await?;
        let last = cursor.try_next().await?;
        Ok(last.and_then(|d| d.get_str("voucher_no").ok().map(str::to_string)))
    }

    async fn get_voucher(&self, id: &str) -> Result<Option<Voucher>, ServiceError> {
        Ok(self.db.vouchers().find_one(doc! { "_id": id }, None).await?)
    }

    async fn vouchers_by_ids(&self, ids: &[String]) -> Result<Vec<Voucher>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self
            .db
            .vouchers()
            .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_vouchers(
        &self,
        filter: &VoucherFilter,
        page: Option<Page>,
    ) -> Result<(Vec<Voucher>, u64), ServiceError> {
        let filter = voucher_filter_document(filter);
        let total = self
            .db
            .vouchers()
            .count_documents(filter.clone(), None)
            .await?;

        let options = match page {
            Some(page) => FindOptions::builder()
                .sort(doc! { "created_at": -1 })
                .skip(page.skip())
                .limit(page.page_size as i64)
                .build(),
            None => FindOptions::builder()
                .sort(doc! { "created_at": -1 })
                .build(),
        };
        let cursor = self.db.vouchers().find(filter, options).await?;
        Ok((cursor.try_collect().await?, total))
    }

    async fn correct_voucher(
        &self,
        id: &str,
        correction: &VoucherCorrection,
    ) -> Result<Voucher, ServiceError> {
        self.with_transaction(|session| {
            let store = self.clone();
            let id = id.to_string();
            let correction = correction.clone();
            Box::pin(async move { store.correct_voucher_in(&id, &correction, session).await })
        })
        .await
    }

    async fn delete_voucher(&self, id: &str) -> Result<(), ServiceError> {
        self.with_transaction(|session| {
            let store = self.clone();
            let id = id.to_string();
            Box::pin(async move { store.delete_voucher_in(&id, session).await })
        })
        .await
    }

    async fn insert_quotation(&self, quotation: &Quotation) -> Result<(), ServiceError> {
        self.db
            .quotations(quotation.kind)
            .insert_one(quotation.to_document()?, None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    ServiceError::DuplicateKey(quotation.quotation_id.clone())
                } else {
                    ServiceError::Database(e)
                }
            })?;
        Ok(())
    }

    async fn last_quotation_id(
        &self,
        kind: QuotationKind,
        prefix: &str,
    ) -> Result<Option<String>, ServiceError> {
        let pipeline = highest_id_pipeline(Document::new(), "_id", prefix);
        let mut cursor = self.db.quotations(kind).aggregate(pipeline, None).await?;
        let last = cursor.try_next().await?;
        Ok(last.and_then(|d| d.get_str("_id").ok().map(str::to_string)))
    }

    async fn get_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Option<Quotation>, ServiceError> {
        let document = self
            .db
            .quotations(kind)
            .find_one(doc! { "_id": quotation_id }, None)
            .await?;
        document
            .map(|d| Quotation::from_document(kind, &d).map_err(ServiceError::from))
            .transpose()
    }

    async fn list_quotations(
        &self,
        kind: QuotationKind,
        page: Page,
    ) -> Result<(Vec<Quotation>, u64), ServiceError> {
        let collection = self.db.quotations(kind);
        let total = collection.count_documents(doc! {}, None).await?;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(page.skip())
            .limit(page.page_size as i64)
            .build();
        let documents: Vec<Document> = collection
            .find(doc! {}, options)
            .await?
            .try_collect()
            .await?;

        let quotations = documents
            .iter()
            .map(|d| Quotation::from_document(kind, d))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((quotations, total))
    }

    async fn update_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
        update: &QuotationUpdate,
    ) -> Result<Quotation, ServiceError> {
        let mut quotation = self
            .get_quotation(kind, quotation_id)
            .await?
            .ok_or(ServiceError::QuotationNotFound)?;
        update.apply(&mut quotation);

        // Only touch the common fields; variant-specific content is left alone.
        let mut set = doc! { "updated_at": bson::DateTime::from_chrono(quotation.updated_at) };
        if update.client_name.is_some() {
            set.insert("client_name", quotation.client_name.clone());
        }
        if update.total_amount.is_some() {
            set.insert(
                kind.total_field_path(),
                Bson::String(quotation.total_amount.to_string()),
            );
        }
        if update.details.is_some() {
            set.insert("details", bson::to_bson(&quotation.details)?);
        }

        self.db
            .quotations(kind)
            .update_one(doc! { "_id": quotation_id }, doc! { "$set": set }, None)
            .await?;
        Ok(quotation)
    }

    async fn allocate(&self, link: PaymentLink) -> Result<AllocationOutcome, ServiceError> {
        self.with_transaction(|session| {
            let store = self.clone();
            let link = link.clone();
            Box::pin(async move { store.allocate_in(link, session).await })
        })
        .await
    }

    async fn update_allocation(
        &self,
        link_id: &str,
        amount: Decimal,
    ) -> Result<AllocationOutcome, ServiceError> {
        self.with_transaction(|session| {
            let store = self.clone();
            let link_id = link_id.to_string();
            Box::pin(async move { store.update_allocation_in(&link_id, amount, session).await })
        })
        .await
    }

    async fn release_allocation(&self, link_id: &str) -> Result<AllocationOutcome, ServiceError> {
        self.with_transaction(|session| {
            let store = self.clone();
            let link_id = link_id.to_string();
            Box::pin(async move { store.release_allocation_in(&link_id, session).await })
        })
        .await
    }

    async fn recompute_quotation_total(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Decimal, ServiceError> {
        self.with_transaction(|session| {
            let store = self.clone();
            let quotation_id = quotation_id.to_string();
            Box::pin(async move { store.recompute_in(kind, &quotation_id, session).await })
        })
        .await
    }

    async fn links_for_quotation(
        &self,
        kind: QuotationKind,
        quotation_id: &str,
    ) -> Result<Vec<PaymentLink>, ServiceError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1 })
            .build();
        let cursor = self
            .db
            .payment_links()
            .find(quotation_filter(kind, quotation_id), options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn links_for_voucher(&self, voucher_id: &str) -> Result<Vec<PaymentLink>, ServiceError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1 })
            .build();
        let cursor = self
            .db
            .payment_links()
            .find(doc! { "voucher_id": voucher_id }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
