//! The cursor-based poll worker.
//!
//! Safety net behind the webhook path: on a timer, queries the carrier for
//! everything modified since the persisted watermark and runs each shipment
//! through the same reconcile entry point the webhook consumer uses. Holds
//! the coordination service's poll mutex for the duration of a tick, and
//! backs off entirely while a bulk backfill job owns the carrier API budget.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::carrier::{CarrierApi, CarrierApiError, QueryWindow};
use crate::coordination::CoordinationService;
use crate::reconcile::ReconcileEngine;
use crate::store::{CursorStore, StoreError};
use crate::worker_status::WorkerStatus;

use super::backfill::TrackingBackfill;
use super::cursor::{SHIPMENT_STREAM, advance_watermark, load_or_seed};

/// Configuration for the poll worker.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Scheduled interval between ticks.
    pub tick_interval: StdDuration,
    /// Maximum pages fetched per tick before yielding to a follow-up tick.
    pub page_budget: u32,
    /// Extra window past `now` when caught up, absorbing clock skew and
    /// writes landing just before the query.
    pub caught_up_overlap: Duration,
    /// Cursor lag beyond which the worker considers itself catching up:
    /// overlap drops to zero (forward progress over re-fetching) and the
    /// backfill sweep is deferred.
    pub catch_up_lag: Duration,
    /// Delay before a follow-up tick when the page budget was exhausted with
    /// pages remaining.
    pub follow_up_delay: StdDuration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            tick_interval: StdDuration::from_secs(120),
            page_budget: 10,
            caught_up_overlap: Duration::seconds(30),
            catch_up_lag: Duration::minutes(10),
            follow_up_delay: StdDuration::from_millis(250),
        }
    }
}

impl PollConfig {
    /// Reads `SHIPSYNC_POLL_INTERVAL_SECS` and `SHIPSYNC_POLL_PAGE_BUDGET`;
    /// unset or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = std::env::var("SHIPSYNC_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.tick_interval = StdDuration::from_secs(secs);
        }
        if let Some(budget) = std::env::var("SHIPSYNC_POLL_PAGE_BUDGET")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.page_budget = budget;
        }
        config
    }
}

/// What a poll tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A bulk backfill job owns the carrier API budget; nothing was fetched.
    SkippedBackfillActive,
    /// Another worker holds the poll mutex (or the coordination store is
    /// down); nothing was fetched.
    SkippedLockHeld,
    Completed {
        pages: u32,
        reconciled: usize,
        failed: usize,
        /// The page budget ran out with pages remaining; the caller should
        /// schedule an immediate follow-up tick.
        more_pages: bool,
    },
}

/// Errors that abort a poll cycle. The mutex is released regardless.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("carrier API error: {0}")]
    Carrier(#[from] CarrierApiError),
}

pub struct PollWorker {
    carrier: Arc<dyn CarrierApi>,
    engine: Arc<ReconcileEngine>,
    cursors: Arc<dyn CursorStore>,
    coordination: CoordinationService,
    backfill: TrackingBackfill,
    config: PollConfig,
    status: WorkerStatus,
}

impl PollWorker {
    pub fn new(
        carrier: Arc<dyn CarrierApi>,
        engine: Arc<ReconcileEngine>,
        cursors: Arc<dyn CursorStore>,
        coordination: CoordinationService,
        backfill: TrackingBackfill,
        config: PollConfig,
    ) -> Self {
        PollWorker {
            carrier,
            engine,
            cursors,
            coordination,
            backfill,
            config,
            status: WorkerStatus::new(),
        }
    }

    /// Handle for querying this worker's state.
    pub fn status(&self) -> WorkerStatus {
        self.status.clone()
    }

    /// Runs one poll tick at the current time.
    pub async fn tick(&self) -> Result<TickOutcome, PollError> {
        self.tick_at(Utc::now()).await
    }

    /// Runs one poll tick as of `now`.
    #[instrument(skip(self))]
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickOutcome, PollError> {
        if self.coordination.is_backfill_active().await {
            info!("bulk backfill active; skipping poll tick");
            return Ok(TickOutcome::SkippedBackfillActive);
        }
        if !self.coordination.acquire_poll_mutex().await {
            debug!("poll mutex held elsewhere; skipping tick");
            return Ok(TickOutcome::SkippedLockHeld);
        }

        // Release the mutex whether the cycle succeeded or threw.
        let result = self.run_cycle(now).await;
        self.coordination.release_poll_mutex().await;
        result
    }

    async fn run_cycle(&self, now: DateTime<Utc>) -> Result<TickOutcome, PollError> {
        let mut watermark = load_or_seed(self.cursors.as_ref(), SHIPMENT_STREAM, now).await?;

        let catching_up = now - watermark > self.config.catch_up_lag;
        let overlap = if catching_up {
            Duration::zero()
        } else {
            self.config.caught_up_overlap
        };
        let window = QueryWindow::new(watermark, now + overlap);

        let mut pages = 0;
        let mut reconciled = 0;
        let mut failed = 0;
        let mut more_pages = false;

        for page_number in 1..=self.config.page_budget {
            let page = self.carrier.list_shipments(window, page_number).await?;
            pages += 1;

            let mut latest_success: Option<DateTime<Utc>> = None;
            let mut earliest_failure: Option<DateTime<Utc>> = None;

            for shipment in &page.shipments {
                match self.engine.reconcile(shipment, None).await {
                    Ok(_) => {
                        reconciled += 1;
                        if let Some(modified) = shipment.modified_at {
                            latest_success =
                                Some(latest_success.map_or(modified, |t| t.max(modified)));
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        warn!(
                            carrier_shipment_id = ?shipment.shipment_id,
                            error = %e,
                            "reconcile failed; holding cursor back for retry"
                        );
                        // A failure with no timestamp pins the cursor where
                        // it is; everything gets re-fetched next cycle.
                        let modified = shipment.modified_at.unwrap_or(window.start);
                        earliest_failure =
                            Some(earliest_failure.map_or(modified, |t| t.min(modified)));
                    }
                }
            }

            let next = advance_watermark(watermark, latest_success, earliest_failure);
            if next != watermark {
                self.cursors.save(SHIPMENT_STREAM, next).await?;
                watermark = next;
            }

            if !page.has_more() {
                break;
            }
            if page_number == self.config.page_budget {
                more_pages = true;
            }
        }

        if !catching_up {
            if let Err(e) = self.backfill.sweep(now).await {
                warn!(error = %e, "tracking backfill sweep failed");
            }
        }

        debug!(pages, reconciled, failed, more_pages, "poll cycle complete");
        Ok(TickOutcome::Completed {
            pages,
            reconciled,
            failed,
            more_pages,
        })
    }

    /// Runs the poll loop until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        self.status.set_running(true);
        info!(interval = ?self.config.tick_interval, "poll worker started");

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {},
            }

            // Keep ticking through a backlog with a short delay between
            // follow-ups instead of waiting out the scheduled interval.
            loop {
                let outcome = self.tick().await;
                self.status.record_tick();
                match outcome {
                    Ok(TickOutcome::Completed {
                        more_pages: true, ..
                    }) if !cancel.is_cancelled() => {
                        tokio::time::sleep(self.config.follow_up_delay).await;
                    }
                    Ok(_) => break,
                    Err(e) => {
                        warn!(error = %e, "poll tick failed; waiting for next interval");
                        break;
                    }
                }
            }
        }

        self.status.set_running(false);
        info!("poll worker stopped");
    }
}
