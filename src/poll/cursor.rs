//! Watermark arithmetic for the poll worker.
//!
//! The persisted cursor is monotonically non-decreasing except for an
//! explicit reset, and never advances past the earliest unresolved failure
//! in a page; a failed write is re-fetched on the next cycle, never
//! silently skipped.

use chrono::{DateTime, Duration, Utc};

use crate::store::{CursorStore, StoreError};

/// The sync stream the poll worker owns.
pub const SHIPMENT_STREAM: &str = "carrier-shipments";

/// First-run catch-up window: with no persisted cursor, start this far back.
const SEED_LOOKBACK_HOURS: i64 = 168;

/// Loads the stream's watermark, seeding and persisting a first-run value
/// `SEED_LOOKBACK_HOURS` in the past when none exists.
pub async fn load_or_seed(
    store: &dyn CursorStore,
    stream: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, StoreError> {
    if let Some(watermark) = store.load(stream).await? {
        return Ok(watermark);
    }
    let seed = now - Duration::hours(SEED_LOOKBACK_HOURS);
    store.save(stream, seed).await?;
    Ok(seed)
}

/// Computes the next watermark after a page.
///
/// Advances to the latest successfully processed `modified_at`, capped one
/// second below the earliest failure so the failed item (and everything
/// after it) falls inside the next query window. Never moves backwards; a
/// page with no successes leaves the watermark untouched.
pub fn advance_watermark(
    previous: DateTime<Utc>,
    latest_success: Option<DateTime<Utc>>,
    earliest_failure: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let Some(success) = latest_success else {
        return previous;
    };
    let candidate = match earliest_failure {
        Some(failure) => success.min(failure - Duration::seconds(1)),
        None => success,
    };
    candidate.max(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCursorStore;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn first_run_seeds_lookback_window_and_persists_it() {
        let store = MemoryCursorStore::new();
        let now = at(0);

        let seeded = load_or_seed(&store, SHIPMENT_STREAM, now).await.unwrap();
        assert_eq!(seeded, now - Duration::hours(168));

        let reloaded = store.load(SHIPMENT_STREAM).await.unwrap();
        assert_eq!(reloaded, Some(seeded));
    }

    #[tokio::test]
    async fn existing_watermark_is_returned_unchanged() {
        let store = MemoryCursorStore::new();
        store.save(SHIPMENT_STREAM, at(30)).await.unwrap();

        let loaded = load_or_seed(&store, SHIPMENT_STREAM, at(45)).await.unwrap();
        assert_eq!(loaded, at(30));
    }

    #[tokio::test]
    async fn reset_erases_watermark_so_next_run_reseeds() {
        let store = MemoryCursorStore::new();
        store.save(SHIPMENT_STREAM, at(30)).await.unwrap();

        store.reset(SHIPMENT_STREAM).await.unwrap();
        assert_eq!(store.load(SHIPMENT_STREAM).await.unwrap(), None);

        let reseeded = load_or_seed(&store, SHIPMENT_STREAM, at(45)).await.unwrap();
        assert_eq!(reseeded, at(45) - Duration::hours(168));
    }

    #[test]
    fn clean_page_advances_to_latest_success() {
        assert_eq!(advance_watermark(at(0), Some(at(10)), None), at(10));
    }

    #[test]
    fn failure_caps_the_watermark_below_its_timestamp() {
        let advanced = advance_watermark(at(0), Some(at(10)), Some(at(5)));
        assert_eq!(advanced, at(5) - Duration::seconds(1));
    }

    #[test]
    fn failure_before_previous_watermark_never_regresses_it() {
        // The cap can only hold the cursor back, not move it backwards.
        let advanced = advance_watermark(at(10), Some(at(20)), Some(at(3)));
        assert_eq!(advanced, at(10));
    }

    #[test]
    fn all_failed_page_leaves_watermark_untouched() {
        assert_eq!(advance_watermark(at(10), None, Some(at(12))), at(10));
    }

    #[test]
    fn empty_page_leaves_watermark_untouched() {
        assert_eq!(advance_watermark(at(10), None, None), at(10));
    }
}
