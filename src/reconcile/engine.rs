//! The reconcile entry point shared by both ingestion paths.
//!
//! Webhook consumer and poll worker both call [`ReconcileEngine::reconcile`],
//! which is what makes the status-protection and matching-priority invariants
//! apply uniformly regardless of origin. The engine is safe for concurrent
//! invocation on the same shipment: it never performs a read-modify-write
//! across an await boundary on fields it does not own, and the merge is
//! idempotent.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::carrier::CarrierPayload;
use crate::lifecycle::{LifecycleNotifier, LifecycleTrigger};
use crate::store::{DeadLetterStore, NewShipment, OrderLedger, ShipmentStore, StoreError};
use crate::types::{DeadLetterEntry, DeadLetterReason, OrderNumber, ShipmentId};

use super::items::composition_changed;
use super::matching::find_existing;
use super::merge::build_update;
use super::normalize::normalize;

/// Result of reconciling one carrier payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A new ledger row was created.
    Created(ShipmentId),

    /// An existing row (possibly a placeholder) was updated in place.
    Updated(ShipmentId),

    /// The payload could not be associated with any order; a dead-letter
    /// entry was written and no shipment row was touched.
    DeadLettered(DeadLetterReason),
}

impl ReconcileOutcome {
    pub fn shipment_id(&self) -> Option<ShipmentId> {
        match self {
            ReconcileOutcome::Created(id) | ReconcileOutcome::Updated(id) => Some(*id),
            ReconcileOutcome::DeadLettered(_) => None,
        }
    }
}

/// Errors from a reconcile attempt. All are infrastructure failures;
/// an unresolvable payload is a [`ReconcileOutcome::DeadLettered`], not an
/// error.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// The record matching & merge engine.
pub struct ReconcileEngine {
    shipments: Arc<dyn ShipmentStore>,
    orders: Arc<dyn OrderLedger>,
    dead_letters: Arc<dyn DeadLetterStore>,
    lifecycle: LifecycleNotifier,
}

impl ReconcileEngine {
    pub fn new(
        shipments: Arc<dyn ShipmentStore>,
        orders: Arc<dyn OrderLedger>,
        dead_letters: Arc<dyn DeadLetterStore>,
        lifecycle: LifecycleNotifier,
    ) -> Self {
        ReconcileEngine {
            shipments,
            orders,
            dead_letters,
            lifecycle,
        }
    }

    /// Reconciles a raw carrier payload into the shipment ledger.
    ///
    /// `explicit_order_id` short-circuits the order-ledger lookup when the
    /// caller already resolved the order (e.g. a manual trigger).
    #[instrument(skip_all, fields(carrier_shipment_id = ?payload.shipment_id))]
    pub async fn reconcile(
        &self,
        payload: &CarrierPayload,
        explicit_order_id: Option<u64>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let normalized = normalize(payload);

        match find_existing(self.shipments.as_ref(), &normalized).await? {
            Some(existing) => {
                let items_changed = composition_changed(&existing.items, &normalized.items);

                let update = build_update(&existing, &normalized);
                self.shipments.update(existing.id, update).await?;
                self.shipments
                    .replace_collections(
                        existing.id,
                        normalized.items.clone(),
                        normalized.tags.clone(),
                        normalized.packages.clone(),
                    )
                    .await?;

                let order_number = normalized
                    .order_number
                    .clone()
                    .or_else(|| existing.order_number.clone());

                if items_changed {
                    info!(shipment = %existing.id, "item composition changed; invalidating derived records");
                    self.lifecycle.notify(
                        existing.id,
                        order_number.clone(),
                        LifecycleTrigger::ItemsChanged,
                    );
                }
                self.lifecycle
                    .notify(existing.id, order_number, LifecycleTrigger::ShipmentSynced);

                debug!(shipment = %existing.id, "shipment updated");
                Ok(ReconcileOutcome::Updated(existing.id))
            }
            None => {
                let Some(order_number) = normalized.order_number.clone() else {
                    warn!("payload has no resolvable order number; dead-lettering");
                    self.dead_letters
                        .push(DeadLetterEntry {
                            carrier_shipment_id: normalized.carrier_shipment_id.clone(),
                            payload: normalized.raw.clone(),
                            reason: DeadLetterReason::NoMatchingOrder,
                            created_at: Utc::now(),
                        })
                        .await?;
                    return Ok(ReconcileOutcome::DeadLettered(
                        DeadLetterReason::NoMatchingOrder,
                    ));
                };

                let order_id = match explicit_order_id {
                    Some(id) => Some(id),
                    None => self.lookup_order(&order_number).await,
                };

                let id = self
                    .shipments
                    .insert(NewShipment {
                        carrier_shipment_id: normalized.carrier_shipment_id.clone(),
                        tracking_number: normalized.tracking_number.clone(),
                        order_number: Some(order_number.clone()),
                        order_id,
                        status: normalized.status.clone(),
                        status_description: normalized.status_description.clone(),
                        shipment_status: normalized.shipment_status,
                        ship_to: normalized.ship_to.clone(),
                        weight_oz: normalized.weight_oz,
                        advanced_options: normalized.advanced_options.clone(),
                        raw_payload: Some(normalized.raw.clone()),
                        items: normalized.items.clone(),
                        tags: normalized.tags.clone(),
                        packages: normalized.packages.clone(),
                    })
                    .await?;

                self.lifecycle
                    .notify(id, Some(order_number), LifecycleTrigger::ShipmentSynced);

                info!(shipment = %id, "shipment created");
                Ok(ReconcileOutcome::Created(id))
            }
        }
    }

    /// Best-effort order ledger lookup. A ledger outage degrades to an
    /// unlinked record (the FK resolves on a later sighting of the order),
    /// it does not fail the reconcile.
    async fn lookup_order(&self, order_number: &OrderNumber) -> Option<u64> {
        match self.orders.find_order_id(order_number).await {
            Ok(found) => found,
            Err(e) => {
                warn!(%order_number, error = %e, "order ledger lookup failed; leaving unlinked");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleSignal;
    use crate::store::memory::{MemoryDeadLetterStore, MemoryOrderLedger, MemoryShipmentStore};
    use crate::test_utils::{arb_payload, payload, shipment_record};
    use crate::types::{CarrierShipmentId, ShipmentRecord, Status, TrackingNumber};
    use proptest::prelude::*;
    use tokio::sync::mpsc;

    struct Fixture {
        engine: ReconcileEngine,
        shipments: Arc<MemoryShipmentStore>,
        orders: Arc<MemoryOrderLedger>,
        dead_letters: Arc<MemoryDeadLetterStore>,
        lifecycle_rx: mpsc::UnboundedReceiver<LifecycleSignal>,
    }

    fn fixture() -> Fixture {
        let shipments = Arc::new(MemoryShipmentStore::new());
        let orders = Arc::new(MemoryOrderLedger::new());
        let dead_letters = Arc::new(MemoryDeadLetterStore::new());
        let (notifier, lifecycle_rx) = LifecycleNotifier::channel();
        let engine = ReconcileEngine::new(
            shipments.clone(),
            orders.clone(),
            dead_letters.clone(),
            notifier,
        );
        Fixture {
            engine,
            shipments,
            orders,
            dead_letters,
            lifecycle_rx,
        }
    }

    #[tokio::test]
    async fn creates_record_and_links_order() {
        let mut fx = fixture();
        fx.orders.seed("A100".into(), 900).await;

        let outcome = fx
            .engine
            .reconcile(&payload("se-55", Some("1Z999"), Some("A100")), None)
            .await
            .unwrap();

        let id = outcome.shipment_id().unwrap();
        let record = fx.shipments.get(id).await.unwrap().unwrap();
        assert_eq!(record.order_id, Some(900));
        assert_eq!(record.tracking_number, Some(TrackingNumber::from("1Z999")));

        let signal = fx.lifecycle_rx.recv().await.unwrap();
        assert_eq!(signal.trigger, LifecycleTrigger::ShipmentSynced);
        assert_eq!(signal.shipment_id, id);
    }

    #[tokio::test]
    async fn placeholder_is_updated_in_place_no_duplicate() {
        let fx = fixture();
        let mut placeholder = shipment_record(1);
        placeholder.order_number = Some("A100".into());
        placeholder.carrier_shipment_id = None;
        placeholder.tracking_number = None;
        fx.shipments.seed(placeholder).await;

        let outcome = fx
            .engine
            .reconcile(&payload("se-55", Some("1Z999"), Some("A100")), None)
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Updated(ShipmentId(1)));
        assert_eq!(fx.shipments.count().await, 1);

        let record = fx.shipments.get(ShipmentId(1)).await.unwrap().unwrap();
        assert_eq!(
            record.carrier_shipment_id,
            Some(CarrierShipmentId::from("se-55"))
        );
        assert_eq!(record.tracking_number, Some(TrackingNumber::from("1Z999")));
    }

    #[tokio::test]
    async fn label_reissue_creates_separate_record() {
        let fx = fixture();
        fx.orders.seed("A100".into(), 900).await;
        fx.orders.seed("A200".into(), 901).await;

        // First sighting binds tracking 1Z999 to carrier shipment se-55.
        fx.engine
            .reconcile(&payload("se-55", Some("1Z999"), Some("A100")), None)
            .await
            .unwrap();

        // Re-issued label: same tracking number, different carrier shipment.
        let outcome = fx
            .engine
            .reconcile(&payload("se-77", Some("1Z999"), Some("A200")), None)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Created(_)));
        assert_eq!(fx.shipments.count().await, 2);
    }

    #[tokio::test]
    async fn no_order_number_dead_letters_without_mutation() {
        let fx = fixture();
        let mut raw = payload("se-55", Some("1Z999"), None);
        raw.order_number = None;

        let outcome = fx.engine.reconcile(&raw, None).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::DeadLettered(DeadLetterReason::NoMatchingOrder)
        );

        assert_eq!(fx.shipments.count().await, 0);
        let entries = fx.dead_letters.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].carrier_shipment_id,
            Some(CarrierShipmentId::from("se-55"))
        );
        assert_eq!(entries[0].reason, DeadLetterReason::NoMatchingOrder);
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let fx = fixture();
        fx.orders.seed("A100".into(), 900).await;
        let raw = payload("se-55", Some("1Z999"), Some("A100"));

        let first = fx.engine.reconcile(&raw, None).await.unwrap();
        let second = fx.engine.reconcile(&raw, None).await.unwrap();

        assert_eq!(fx.shipments.count().await, 1);
        let id = first.shipment_id().unwrap();
        assert_eq!(second, ReconcileOutcome::Updated(id));

        let record = fx.shipments.get(id).await.unwrap().unwrap();
        assert_eq!(record.order_id, Some(900));
    }

    /// A record's observable state, with the audit timestamp normalized away
    /// so converged first- and second-pass rows compare equal.
    fn observable_state(mut record: ShipmentRecord) -> serde_json::Value {
        record.updated_at = record.created_at;
        serde_json::to_value(record).unwrap()
    }

    proptest! {
        /// Reconciling any payload twice converges: the ledger holds at most
        /// one row, and the second pass changes nothing but the audit
        /// timestamp. Unmatchable payloads dead-letter on every attempt
        /// without ever touching the ledger.
        #[test]
        fn prop_reconcile_twice_converges(raw in arb_payload()) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let fx = fixture();

                let first = fx.engine.reconcile(&raw, None).await.unwrap();
                let rows_after_first: Vec<_> = fx
                    .shipments
                    .all()
                    .await
                    .into_iter()
                    .map(observable_state)
                    .collect();

                let second = fx.engine.reconcile(&raw, None).await.unwrap();
                let rows_after_second: Vec<_> = fx
                    .shipments
                    .all()
                    .await
                    .into_iter()
                    .map(observable_state)
                    .collect();

                match first {
                    ReconcileOutcome::Created(id) => {
                        prop_assert_eq!(second, ReconcileOutcome::Updated(id));
                        prop_assert_eq!(fx.shipments.count().await, 1);
                        prop_assert_eq!(rows_after_first, rows_after_second);
                    }
                    ReconcileOutcome::DeadLettered(reason) => {
                        prop_assert_eq!(second, ReconcileOutcome::DeadLettered(reason));
                        prop_assert_eq!(fx.shipments.count().await, 0);
                    }
                    ReconcileOutcome::Updated(_) => {
                        prop_assert!(false, "first pass on an empty ledger cannot update");
                    }
                }
                Ok(())
            })?;
        }
    }

    #[tokio::test]
    async fn tracking_code_survives_poll_snapshot() {
        let fx = fixture();
        fx.orders.seed("A100".into(), 900).await;

        // Tracking webhook marks the shipment delivered.
        let mut tracking = payload("se-55", Some("1Z999"), Some("A100"));
        tracking.tracking_status = Some("DE".to_string());
        fx.engine.reconcile(&tracking, None).await.unwrap();

        // A later poll snapshot without tracking status must not regress it.
        let snapshot = payload("se-55", Some("1Z999"), Some("A100"));
        let outcome = fx.engine.reconcile(&snapshot, None).await.unwrap();
        let id = outcome.shipment_id().unwrap();

        let record = fx.shipments.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, Status::tracking_code("DE"));
    }

    #[tokio::test]
    async fn item_change_emits_invalidation_signal() {
        let mut fx = fixture();
        fx.orders.seed("A100".into(), 900).await;

        let mut first = payload("se-55", Some("1Z999"), Some("A100"));
        first.items = Some(vec![crate::carrier::PayloadItem {
            sku: Some("WIDGET".to_string()),
            quantity: Some(2),
            ..Default::default()
        }]);
        fx.engine.reconcile(&first, None).await.unwrap();
        // Drain the creation signal.
        let _ = fx.lifecycle_rx.recv().await.unwrap();

        let mut second = first.clone();
        second.items = Some(vec![crate::carrier::PayloadItem {
            sku: Some("WIDGET".to_string()),
            quantity: Some(1),
            ..Default::default()
        }]);
        fx.engine.reconcile(&second, None).await.unwrap();

        let signal = fx.lifecycle_rx.recv().await.unwrap();
        assert_eq!(signal.trigger, LifecycleTrigger::ItemsChanged);
        let signal = fx.lifecycle_rx.recv().await.unwrap();
        assert_eq!(signal.trigger, LifecycleTrigger::ShipmentSynced);
    }

    #[tokio::test]
    async fn order_ledger_outage_degrades_to_unlinked_record() {
        let fx = fixture();
        fx.orders.set_unavailable(true);

        let outcome = fx
            .engine
            .reconcile(&payload("se-55", Some("1Z999"), Some("A100")), None)
            .await
            .unwrap();

        let id = outcome.shipment_id().unwrap();
        let record = fx.shipments.get(id).await.unwrap().unwrap();
        assert_eq!(record.order_id, None);
        assert_eq!(record.order_number, Some("A100".into()));
    }

    #[tokio::test]
    async fn explicit_order_id_skips_ledger_lookup() {
        let fx = fixture();
        fx.orders.set_unavailable(true);

        let outcome = fx
            .engine
            .reconcile(&payload("se-55", Some("1Z999"), Some("A100")), Some(777))
            .await
            .unwrap();

        let record = fx
            .shipments
            .get(outcome.shipment_id().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.order_id, Some(777));
    }
}
