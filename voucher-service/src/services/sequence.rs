//! Sequential, human-readable identifiers.
//!
//! Voucher numbers are `RV-000042` / `PV-000042`, one sequence per voucher
//! type. Quotation ids are `HQ-2610-0007`: variant prefix, `YYMM` of
//! creation, then a sequence that restarts every month. The width is a
//! minimum; sequences grow past it (`QQ-2610-10000`).

use crate::models::{QuotationKind, VoucherType};
use crate::services::metrics;
use crate::services::ServiceError;
use chrono::{DateTime, Utc};
use std::future::Future;
use tracing::warn;

/// Attempts made before giving up on a colliding identifier.
pub const MAX_ID_ATTEMPTS: u32 = 5;

pub const VOUCHER_NO_WIDTH: usize = 6;
pub const QUOTATION_SEQ_WIDTH: usize = 4;

/// Sequence number of `id`, when it is `prefix` followed by digits only.
pub fn sequence_of(prefix: &str, id: &str) -> Option<u64> {
    let digits = id.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// The id with the highest sequence number. Ids that are not `prefix`
/// plus digits are ignored.
pub fn highest_id<'a>(prefix: &str, ids: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    ids.into_iter()
        .filter_map(|id| sequence_of(prefix, id).map(|seq| (seq, id)))
        .max_by_key(|(seq, _)| *seq)
        .map(|(_, id)| id)
}

/// Sequence number following `last`, or 1 when there is none.
///
/// `last` must start with `prefix`; anything unparsable restarts the sequence.
pub fn next_sequence(prefix: &str, last: Option<&str>) -> u64 {
    last.and_then(|id| sequence_of(prefix, id))
        .map(|seq| seq + 1)
        .unwrap_or(1)
}

pub fn format_id(prefix: &str, seq: u64, width: usize) -> String {
    format!("{}{:0width$}", prefix, seq, width = width)
}

pub fn voucher_no_prefix(voucher_type: VoucherType) -> &'static str {
    voucher_type.number_prefix()
}

/// `HQ-2610-` for a hotel quotation created in October 2026.
pub fn quotation_id_prefix(kind: QuotationKind, now: DateTime<Utc>) -> String {
    format!("{}-{}-", kind.id_prefix(), now.format("%y%m"))
}

/// Call `insert` with `seq`, moving on to the next number each time it
/// reports [`ServiceError::DuplicateKey`]. Gives up after [`MAX_ID_ATTEMPTS`].
pub async fn insert_with_next_id<T, F, Fut>(
    entity: &'static str,
    mut seq: u64,
    mut insert: F,
) -> Result<T, ServiceError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    for attempt in 1..=MAX_ID_ATTEMPTS {
        match insert(seq).await {
            Err(ServiceError::DuplicateKey(taken)) => {
                metrics::record_id_collision(entity);
                warn!(attempt, entity, id = %taken, "Identifier taken, trying next");
                seq += 1;
            }
            other => return other,
        }
    }

    Err(ServiceError::IdentifierExhausted(MAX_ID_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn first_id_starts_at_one() {
        assert_eq!(next_sequence("RV-", None), 1);
        assert_eq!(format_id("RV-", 1, VOUCHER_NO_WIDTH), "RV-000001");
    }

    #[test]
    fn continues_after_last_id() {
        assert_eq!(next_sequence("PV-", Some("PV-000041")), 42);
        assert_eq!(next_sequence("HQ-2610-", Some("HQ-2610-0099")), 100);
        assert_eq!(next_sequence("QQ-2610-", Some("QQ-2610-10000")), 10001);
    }

    #[test]
    fn foreign_or_malformed_ids_restart_the_sequence() {
        assert_eq!(next_sequence("HQ-2611-", Some("HQ-2610-0099")), 1);
        assert_eq!(next_sequence("RV-", Some("RV-abc")), 1);
        assert_eq!(next_sequence("RV-", Some("RV-+12")), 1);
    }

    #[test]
    fn sequence_overflowing_width_keeps_all_digits() {
        assert_eq!(format_id("QQ-2601-", 10000, QUOTATION_SEQ_WIDTH), "QQ-2601-10000");
    }

    #[test]
    fn highest_id_compares_numbers_not_strings() {
        let ids = ["QQ-2610-9999", "QQ-2610-10000", "QQ-2610-0042", "QQ-2610-00ZZ"];
        assert_eq!(highest_id("QQ-2610-", ids), Some("QQ-2610-10000"));

        let vouchers = ["RV-999999", "RV-1000000"];
        assert_eq!(highest_id("RV-", vouchers), Some("RV-1000000"));

        assert_eq!(highest_id("QQ-2610-", ["QQ-2610-legacy"]), None);
    }

    #[test]
    fn quotation_prefix_uses_year_and_month() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        assert_eq!(quotation_id_prefix(QuotationKind::Full, now), "FP-2610-");
        assert_eq!(quotation_id_prefix(QuotationKind::Hotel, now), "HQ-2610-");
    }

    #[tokio::test]
    async fn taken_numbers_are_stepped_over() {
        let id = insert_with_next_id("quotation", 7, |seq| async move {
            if seq < 9 {
                Err(ServiceError::DuplicateKey(format!("HQ-2610-{:04}", seq)))
            } else {
                Ok(seq)
            }
        })
        .await
        .unwrap();
        assert_eq!(id, 9);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = insert_with_next_id("voucher", 1, |seq| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(ServiceError::DuplicateKey(format!("RV-{:06}", seq))) }
        })
        .await;

        assert!(matches!(
            result,
            Err(ServiceError::IdentifierExhausted(MAX_ID_ATTEMPTS))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ID_ATTEMPTS);
    }

    #[tokio::test]
    async fn other_errors_stop_immediately() {
        let result: Result<(), _> =
            insert_with_next_id("voucher", 1, |_| async { Err(ServiceError::VoucherNotFound) })
                .await;
        assert!(matches!(result, Err(ServiceError::VoucherNotFound)));
    }
}
