//! Payload normalization and status derivation.
//!
//! Builds the full normalized record the merge step works from. Status
//! derivation encodes the rule that only a tracking webhook may assert an
//! in-transit/delivered/accepted code; the sync paths never invent one.

use chrono::{DateTime, Utc};

use crate::carrier::CarrierPayload;
use crate::types::{
    Address, CarrierShipmentId, OrderNumber, ShipmentItem, ShipmentPackage, ShipmentStatus,
    ShipmentTag, Status, TrackingNumber,
};

/// A carrier payload reduced to the fields the ledger stores, with the
/// lifecycle status derived.
#[derive(Debug, Clone)]
pub struct NormalizedShipment {
    pub carrier_shipment_id: Option<CarrierShipmentId>,
    pub tracking_number: Option<TrackingNumber>,
    pub order_number: Option<OrderNumber>,
    pub status: Status,
    pub status_description: Option<String>,
    pub shipment_status: Option<ShipmentStatus>,
    pub ship_to: Option<Address>,
    pub weight_oz: Option<f64>,
    pub advanced_options: Option<serde_json::Value>,
    pub items: Vec<ShipmentItem>,
    pub tags: Vec<ShipmentTag>,
    pub packages: Vec<ShipmentPackage>,
    pub raw: serde_json::Value,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Derives the lifecycle-facing status from a carrier payload.
///
/// Rules, in order:
/// 1. A voided label (explicit flag or any voided label-list element) is
///    `cancelled`.
/// 2. An explicit tracking status code is used verbatim, upper-cased.
/// 3. Otherwise the carrier's lifecycle status maps to an editable code:
///    `on_hold`/`awaiting_shipment` → `pending`, `cancelled` → `cancelled`,
///    anything else (including `label_purchased`) → `new`.
pub fn derive_status(payload: &CarrierPayload) -> (Status, Option<String>) {
    if payload.is_voided() {
        return (Status::cancelled(), Some("label voided".to_string()));
    }

    if let Some(code) = payload.tracking_status.as_deref() {
        return (
            Status::tracking_code(code),
            payload.tracking_status_description.clone(),
        );
    }

    let status = match payload.shipment_status.as_deref() {
        Some("on_hold") | Some("awaiting_shipment") => Status::pending(),
        Some("cancelled") => Status::cancelled(),
        _ => Status::new_shipment(),
    };
    (status, None)
}

/// Builds the full normalized record from a raw carrier payload.
pub fn normalize(payload: &CarrierPayload) -> NormalizedShipment {
    let (status, status_description) = derive_status(payload);

    let items = payload
        .items
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|item| {
            let sku = item.sku.clone()?;
            Some(ShipmentItem {
                sku,
                name: item.name.clone(),
                quantity: item.quantity.unwrap_or(0),
                unit_price: item.unit_price,
            })
        })
        .collect();

    let tags = payload
        .tags
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|tag| {
            Some(ShipmentTag {
                tag_id: tag.tag_id?,
                name: tag.name.clone(),
            })
        })
        .collect();

    let packages = payload
        .packages
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|package| ShipmentPackage {
            code: package.code.clone(),
            weight_oz: package.weight_oz,
            length: package.length,
            width: package.width,
            height: package.height,
        })
        .collect();

    // Serialization of an already-deserialized payload cannot fail; fall
    // back to null rather than propagate.
    let raw = serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);

    NormalizedShipment {
        carrier_shipment_id: payload.shipment_id.clone().map(CarrierShipmentId::new),
        tracking_number: payload.tracking_number.clone().map(TrackingNumber::new),
        order_number: payload.order_number.clone().map(OrderNumber::new),
        status,
        status_description,
        shipment_status: payload
            .shipment_status
            .as_deref()
            .and_then(ShipmentStatus::parse),
        ship_to: payload.ship_to.clone(),
        weight_oz: payload.weight.as_ref().and_then(|w| w.to_ounces()),
        advanced_options: payload.advanced_options.clone(),
        items,
        tags,
        packages,
        raw,
        modified_at: payload.modified_at,
    }
}
