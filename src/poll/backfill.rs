//! The tracking-backfill sweep.
//!
//! Shipments can be marked `shipped` while their tracking number is still
//! missing (the label was assigned after the bulk sync window passed, or a
//! webhook was lost). Once per poll tick, when the worker is caught up, a
//! small batch of such shipments is re-fetched directly from the carrier by
//! ID to pick up the tracking data.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument, warn};

use crate::carrier::CarrierApi;
use crate::reconcile::ReconcileEngine;
use crate::store::{ShipmentStore, StoreError};

/// Configuration for the tracking-backfill sweep.
#[derive(Debug, Clone, Copy)]
pub struct BackfillConfig {
    /// Candidates fetched per sweep. Small: each costs one carrier API call.
    pub batch_size: usize,
    /// Only shipments older than this are swept; younger ones usually get
    /// their tracking number through the ordinary paths.
    pub min_age: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        BackfillConfig {
            batch_size: 10,
            min_age: Duration::hours(48),
        }
    }
}

/// Summary of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub candidates: usize,
    pub refreshed: usize,
    /// Candidates the carrier no longer knows about.
    pub missing: usize,
}

pub struct TrackingBackfill {
    shipments: Arc<dyn ShipmentStore>,
    carrier: Arc<dyn CarrierApi>,
    engine: Arc<ReconcileEngine>,
    config: BackfillConfig,
}

impl TrackingBackfill {
    pub fn new(
        shipments: Arc<dyn ShipmentStore>,
        carrier: Arc<dyn CarrierApi>,
        engine: Arc<ReconcileEngine>,
        config: BackfillConfig,
    ) -> Self {
        TrackingBackfill {
            shipments,
            carrier,
            engine,
            config,
        }
    }

    /// Runs one sweep. Per-candidate failures are logged and skipped; only a
    /// failure of the candidate query itself is raised.
    #[instrument(skip_all)]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepSummary, StoreError> {
        let candidates = self
            .shipments
            .find_shipped_without_tracking(now - self.config.min_age, self.config.batch_size)
            .await?;

        let mut summary = SweepSummary {
            candidates: candidates.len(),
            ..Default::default()
        };

        for record in candidates {
            let Some(carrier_id) = record.carrier_shipment_id.as_ref() else {
                // Nothing to re-fetch by; the poll window is its only hope.
                continue;
            };
            match self.carrier.get_shipment(carrier_id).await {
                Ok(Some(payload)) => {
                    if let Err(e) = self.engine.reconcile(&payload, None).await {
                        warn!(shipment = %record.id, error = %e, "backfill reconcile failed");
                    } else {
                        summary.refreshed += 1;
                    }
                }
                Ok(None) => {
                    debug!(shipment = %record.id, carrier_id = %carrier_id, "carrier no longer knows shipment");
                    summary.missing += 1;
                }
                Err(e) => {
                    warn!(shipment = %record.id, error = %e, "backfill fetch failed; will retry next sweep");
                }
            }
        }

        if summary.candidates > 0 {
            debug!(?summary, "tracking backfill sweep complete");
        }
        Ok(summary)
    }
}
