//! The reconciled shipment projection and its associated records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CarrierShipmentId, OrderNumber, ShipmentId, TrackingNumber};
use super::status::{ShipmentStatus, Status};

/// A denormalized ship-to address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub name: Option<String>,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// A line item on a shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub sku: String,
    pub name: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<f64>,
}

/// A tag applied to a shipment in the carrier system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentTag {
    pub tag_id: i64,
    pub name: Option<String>,
}

/// A packaging unit within a shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentPackage {
    pub code: Option<String>,
    pub weight_oz: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// The reconciled internal projection of a carrier shipment.
///
/// Created by the merge engine on first sighting (webhook, poll page, or
/// order-session placeholder insert), mutated on every subsequent sighting,
/// never hard-deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub id: ShipmentId,

    /// Nullable until the carrier creates a label.
    pub carrier_shipment_id: Option<CarrierShipmentId>,

    pub tracking_number: Option<TrackingNumber>,

    /// Join key to the separate order ledger.
    pub order_number: Option<OrderNumber>,

    /// Foreign key into the order ledger, resolved lazily.
    pub order_id: Option<u64>,

    /// Lifecycle-facing status code. See [`Status`] for the protection
    /// invariant on carrier tracking codes.
    pub status: Status,

    pub status_description: Option<String>,

    /// Warehouse-facing status in the carrier's vocabulary.
    pub shipment_status: Option<ShipmentStatus>,

    pub ship_to: Option<Address>,

    pub weight_oz: Option<f64>,

    pub advanced_options: Option<serde_json::Value>,

    /// The raw last-seen carrier payload, preserved for replay/debugging.
    pub raw_payload: Option<serde_json::Value>,

    pub items: Vec<ShipmentItem>,
    pub tags: Vec<ShipmentTag>,
    pub packages: Vec<ShipmentPackage>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShipmentRecord {
    /// Returns true if this is a placeholder row pre-created by the warehouse
    /// picking subsystem: no carrier label exists yet.
    pub fn is_placeholder(&self) -> bool {
        self.carrier_shipment_id.is_none() && self.tracking_number.is_none()
    }
}

/// Reason a payload was dead-lettered instead of reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// No order number was derivable anywhere in the payload.
    NoMatchingOrder,
}

impl std::fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeadLetterReason::NoMatchingOrder => write!(f, "no matching order"),
        }
    }
}

/// A payload that could not be matched to any internal order, held for
/// manual triage. Never auto-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub carrier_shipment_id: Option<CarrierShipmentId>,
    pub payload: serde_json::Value,
    pub reason: DeadLetterReason,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::shipment_record;

    #[test]
    fn placeholder_detection() {
        let mut record = shipment_record(1);
        record.carrier_shipment_id = None;
        record.tracking_number = None;
        assert!(record.is_placeholder());

        record.tracking_number = Some(TrackingNumber::from("1Z999"));
        assert!(!record.is_placeholder());
    }

    #[test]
    fn dead_letter_reason_serializes_snake_case() {
        let json = serde_json::to_string(&DeadLetterReason::NoMatchingOrder).unwrap();
        assert_eq!(json, "\"no_matching_order\"");
    }
}
