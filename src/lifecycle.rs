//! The outbound "evaluate lifecycle" signal.
//!
//! After every successful reconcile the merge engine notifies the external
//! lifecycle/packaging subsystem. The notification is fire-and-forget: a
//! lifecycle consumer failure must never fail the reconcile that produced it.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::types::{OrderNumber, ShipmentId};

/// Why the lifecycle evaluation was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleTrigger {
    /// A shipment was created or updated by the merge engine.
    ShipmentSynced,

    /// The shipment's item composition changed (split/merge event);
    /// downstream fingerprint/packaging decisions must be invalidated.
    ItemsChanged,
}

/// The signal payload consumed by the external lifecycle subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleSignal {
    pub shipment_id: ShipmentId,
    pub order_number: Option<OrderNumber>,
    pub trigger: LifecycleTrigger,
}

/// Sender half of the lifecycle signal channel.
///
/// Cheap to clone. Sending never blocks and never errors out to the caller;
/// a closed channel is logged and swallowed.
#[derive(Clone)]
pub struct LifecycleNotifier {
    tx: mpsc::UnboundedSender<LifecycleSignal>,
}

impl LifecycleNotifier {
    /// Creates a notifier and the receiver the lifecycle consumer drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LifecycleSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (LifecycleNotifier { tx }, rx)
    }

    /// Creates a notifier whose signals go nowhere. Useful in tests that do
    /// not assert on lifecycle output.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        LifecycleNotifier { tx }
    }

    /// Emits a signal, fire-and-forget.
    pub fn notify(
        &self,
        shipment_id: ShipmentId,
        order_number: Option<OrderNumber>,
        trigger: LifecycleTrigger,
    ) {
        let signal = LifecycleSignal {
            shipment_id,
            order_number,
            trigger,
        };
        if self.tx.send(signal).is_err() {
            warn!(%shipment_id, "lifecycle consumer gone; dropping signal");
        }
    }
}
