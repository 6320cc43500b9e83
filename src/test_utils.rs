//! Shared test builders and arbitrary generators for property-based testing.

use chrono::Utc;
use proptest::prelude::*;

use crate::carrier::{CarrierPayload, PayloadItem};
use crate::types::{OrderNumber, ShipmentId, ShipmentRecord, Status, TrackingNumber};

/// A minimal carrier payload with the three identity fields set.
pub fn payload(
    shipment_id: &str,
    tracking_number: Option<&str>,
    order_number: Option<&str>,
) -> CarrierPayload {
    CarrierPayload {
        shipment_id: Some(shipment_id.to_string()),
        tracking_number: tracking_number.map(str::to_string),
        order_number: order_number.map(str::to_string),
        shipment_status: Some("awaiting_shipment".to_string()),
        modified_at: Some(Utc::now()),
        ..Default::default()
    }
}

/// A blank ledger record with the given ID. Tests override the fields they
/// care about.
pub fn shipment_record(id: u64) -> ShipmentRecord {
    let now = Utc::now();
    ShipmentRecord {
        id: ShipmentId(id),
        carrier_shipment_id: None,
        tracking_number: None,
        order_number: None,
        order_id: None,
        status: Status::pending(),
        status_description: None,
        shipment_status: None,
        ship_to: None,
        weight_oz: None,
        advanced_options: None,
        raw_payload: None,
        items: Vec::new(),
        tags: Vec::new(),
        packages: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn arb_tracking_number() -> impl Strategy<Value = TrackingNumber> {
    "1Z[0-9A-Z]{8}".prop_map(TrackingNumber::new)
}

pub fn arb_order_number() -> impl Strategy<Value = OrderNumber> {
    "[A-Z][0-9]{3,6}".prop_map(OrderNumber::new)
}

pub fn arb_item() -> impl Strategy<Value = PayloadItem> {
    ("[A-Z]{3,8}", 1u32..20).prop_map(|(sku, quantity)| PayloadItem {
        sku: Some(sku),
        quantity: Some(quantity),
        ..Default::default()
    })
}

pub fn arb_payload() -> impl Strategy<Value = CarrierPayload> {
    (
        "se-[0-9]{1,6}",
        proptest::option::of(arb_tracking_number()),
        proptest::option::of(arb_order_number()),
        prop::collection::vec(arb_item(), 0..4),
    )
        .prop_map(|(shipment_id, tracking, order, items)| CarrierPayload {
            shipment_id: Some(shipment_id),
            tracking_number: tracking.map(|t| t.0),
            order_number: order.map(|o| o.0),
            shipment_status: Some("awaiting_shipment".to_string()),
            items: Some(items),
            modified_at: Some(Utc::now()),
            ..Default::default()
        })
}
