//! Distributed mutual-exclusion and signaling over a shared key-value store.
//!
//! Two primitives live here:
//!
//! - The **poll mutex**: a single-holder, short-TTL lock preventing
//!   overlapping poll cycles. Acquisition failure is never fatal; callers
//!   skip the cycle.
//! - The **backfill exclusive window**: a day-TTL flag recording which bulk
//!   job wants other workers to back off from carrier-API-heavy operations.
//!
//! The failure modes are deliberately asymmetric. `acquire_poll_mutex`
//! returns `false` when the store is unreachable (fail-closed: better to skip
//! a poll tick than run two concurrently), while `is_backfill_active` returns
//! `false` on a read error (fail-open: a coordination outage must not block
//! ordinary synchronization indefinitely). Both TTLs are safety nets against
//! crashed holders; `clear_all` at process start handles the common case
//! without waiting for expiry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::store::KeyValueStore;
use crate::types::JobId;

/// Key for the poll worker's single-holder lock.
pub const POLL_LOCK_KEY: &str = "sync:poll-lock";

/// Key for the backfill exclusive-window flag; value is the owning job ID.
pub const BACKFILL_FLAG_KEY: &str = "sync:backfill-active";

/// Poll mutex TTL. Generous relative to a tick so a slow tick does not lose
/// its lock, short enough that a crashed holder clears within minutes.
pub const POLL_LOCK_TTL: Duration = Duration::from_secs(600);

/// Backfill flag TTL. Bulk jobs run for hours; a crashed job's flag clears
/// within a day.
pub const BACKFILL_FLAG_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Coordination service over a shared key-value store.
///
/// Cheap to clone; all clones share the same backing store.
#[derive(Clone)]
pub struct CoordinationService {
    kv: Arc<dyn KeyValueStore>,
}

impl CoordinationService {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        CoordinationService { kv }
    }

    /// Attempts to acquire the poll mutex.
    ///
    /// Returns `false` both when the lock is genuinely held and when the
    /// store is unreachable; callers treat both as "skip this cycle".
    pub async fn acquire_poll_mutex(&self) -> bool {
        match self
            .kv
            .set_if_absent(POLL_LOCK_KEY, "held", POLL_LOCK_TTL)
            .await
        {
            Ok(acquired) => {
                debug!(acquired, "poll mutex acquisition attempted");
                acquired
            }
            Err(e) => {
                warn!(error = %e, "coordination store unreachable; skipping poll cycle");
                false
            }
        }
    }

    /// Best-effort release of the poll mutex.
    ///
    /// Failures are logged, never raised: a held TTL-bounded lock
    /// self-expires and cannot deadlock the system.
    pub async fn release_poll_mutex(&self) {
        if let Err(e) = self.kv.delete(POLL_LOCK_KEY).await {
            warn!(error = %e, "failed to release poll mutex; TTL will clear it");
        }
    }

    /// Marks the start of a bulk job's exclusive window.
    ///
    /// Returns `false` if another job already holds the window or the store
    /// is unreachable; the bulk job should not start in either case.
    pub async fn begin_exclusive_window(&self, owner: &JobId) -> bool {
        match self
            .kv
            .set_if_absent(BACKFILL_FLAG_KEY, owner.as_str(), BACKFILL_FLAG_TTL)
            .await
        {
            Ok(true) => {
                info!(owner = %owner, "backfill exclusive window opened");
                true
            }
            Ok(false) => {
                warn!(owner = %owner, "backfill exclusive window already held");
                false
            }
            Err(e) => {
                warn!(error = %e, "coordination store unreachable; refusing exclusive window");
                false
            }
        }
    }

    /// Best-effort close of the exclusive window.
    pub async fn end_exclusive_window(&self) {
        if let Err(e) = self.kv.delete(BACKFILL_FLAG_KEY).await {
            warn!(error = %e, "failed to close backfill window; TTL will clear it");
        } else {
            info!("backfill exclusive window closed");
        }
    }

    /// Returns true if a bulk job currently holds the exclusive window.
    ///
    /// Defaults to `false` on any read error: fail-open.
    pub async fn is_backfill_active(&self) -> bool {
        match self.kv.get(BACKFILL_FLAG_KEY).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                warn!(error = %e, "coordination store unreachable; assuming no backfill");
                false
            }
        }
    }

    /// Returns the job ID holding the exclusive window, if any.
    pub async fn backfill_owner(&self) -> Option<JobId> {
        match self.kv.get(BACKFILL_FLAG_KEY).await {
            Ok(value) => value.map(JobId::new),
            Err(_) => None,
        }
    }

    /// Erases every lock left behind by a prior crash. Called once at
    /// process start so a phantom lock cannot block workers forever.
    pub async fn clear_all(&self) {
        for key in [POLL_LOCK_KEY, BACKFILL_FLAG_KEY] {
            if let Err(e) = self.kv.delete(key).await {
                warn!(key, error = %e, "failed to clear stale lock at startup");
            }
        }
        info!("coordination state cleared at startup");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryKeyValueStore;

    fn service() -> (CoordinationService, Arc<MemoryKeyValueStore>) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        (CoordinationService::new(kv.clone()), kv)
    }

    #[tokio::test]
    async fn poll_mutex_is_single_holder() {
        let (coordination, _kv) = service();
        assert!(coordination.acquire_poll_mutex().await);
        assert!(!coordination.acquire_poll_mutex().await);

        coordination.release_poll_mutex().await;
        assert!(coordination.acquire_poll_mutex().await);
    }

    #[tokio::test]
    async fn acquire_fails_closed_when_store_unreachable() {
        let (coordination, kv) = service();
        kv.set_unavailable(true);
        assert!(!coordination.acquire_poll_mutex().await);
    }

    #[tokio::test]
    async fn backfill_check_fails_open_when_store_unreachable() {
        let (coordination, kv) = service();
        // The asymmetry: acquire says false (skip), is_backfill_active says
        // false (proceed).
        kv.set_unavailable(true);
        assert!(!coordination.is_backfill_active().await);
    }

    #[tokio::test]
    async fn exclusive_window_records_owner() {
        let (coordination, _kv) = service();
        let owner = JobId::from("backfill-42");

        assert!(coordination.begin_exclusive_window(&owner).await);
        assert!(coordination.is_backfill_active().await);
        assert_eq!(coordination.backfill_owner().await, Some(owner.clone()));

        // A second job cannot take the window while held.
        assert!(
            !coordination
                .begin_exclusive_window(&JobId::from("backfill-43"))
                .await
        );

        coordination.end_exclusive_window().await;
        assert!(!coordination.is_backfill_active().await);
    }

    #[tokio::test]
    async fn release_is_best_effort_under_outage() {
        let (coordination, kv) = service();
        assert!(coordination.acquire_poll_mutex().await);
        kv.set_unavailable(true);
        // Must not panic or propagate.
        coordination.release_poll_mutex().await;
        coordination.end_exclusive_window().await;
    }

    #[tokio::test]
    async fn clear_all_erases_stale_locks() {
        let (coordination, _kv) = service();
        assert!(coordination.acquire_poll_mutex().await);
        assert!(
            coordination
                .begin_exclusive_window(&JobId::from("crashed-job"))
                .await
        );

        // Simulated restart.
        coordination.clear_all().await;

        assert!(coordination.acquire_poll_mutex().await);
        assert!(!coordination.is_backfill_active().await);
    }
}
