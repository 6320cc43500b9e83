//! The protected field-level merge.
//!
//! Builds the write set applied to an existing record from a fresh normalized
//! snapshot. Two rules make the merge safe under concurrent, out-of-order,
//! at-least-once delivery:
//!
//! - **Status protection**: once the stored status holds a carrier tracking
//!   code, the status and its description are dropped from the write set.
//!   Only the status derived from a fresh tracking webhook (itself a tracking
//!   code) may replace it.
//! - **Defined-only writes**: a field absent from the payload never nulls out
//!   previously known data; the write set simply omits it.

use crate::store::ShipmentUpdate;
use crate::types::ShipmentRecord;

use super::normalize::NormalizedShipment;

/// Builds the field-level update for an existing record.
pub fn build_update(existing: &ShipmentRecord, normalized: &NormalizedShipment) -> ShipmentUpdate {
    // A stored carrier tracking code is immutable to sync writes, unless the
    // incoming snapshot itself asserts a tracking code (a fresh tracking
    // webhook flows through this same path).
    let status_writable =
        existing.status.is_editable() || normalized.status.is_carrier_tracking_code();

    ShipmentUpdate {
        carrier_shipment_id: normalized.carrier_shipment_id.clone(),
        tracking_number: normalized.tracking_number.clone(),
        order_number: normalized.order_number.clone(),
        // The order FK is resolved at create time; merge never rewrites it.
        order_id: None,
        status: status_writable.then(|| normalized.status.clone()),
        status_description: if status_writable {
            normalized.status_description.clone()
        } else {
            None
        },
        shipment_status: normalized.shipment_status,
        ship_to: normalized.ship_to.clone(),
        weight_oz: normalized.weight_oz,
        advanced_options: normalized.advanced_options.clone(),
        raw_payload: Some(normalized.raw.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::normalize::normalize;
    use crate::test_utils::{payload, shipment_record};
    use crate::types::{Status, TrackingNumber};

    #[test]
    fn editable_status_is_overwritten() {
        let mut existing = shipment_record(1);
        existing.status = Status::pending();

        let normalized = normalize(&payload("se-55", Some("1Z999"), Some("A100")));
        let update = build_update(&existing, &normalized);
        assert!(update.status.is_some());
    }

    #[test]
    fn tracking_code_status_is_protected_from_sync_writes() {
        let mut existing = shipment_record(1);
        existing.status = Status::tracking_code("DE");
        existing.status_description = Some("Delivered".to_string());

        // A poll-path snapshot with no tracking status derives an editable
        // code; it must not regress the delivered status.
        let normalized = normalize(&payload("se-55", Some("1Z999"), Some("A100")));
        assert!(normalized.status.is_editable());

        let update = build_update(&existing, &normalized);
        assert!(update.status.is_none());
        assert!(update.status_description.is_none());
        // Other fields still flow.
        assert!(update.raw_payload.is_some());
        assert_eq!(update.tracking_number, Some(TrackingNumber::from("1Z999")));
    }

    #[test]
    fn fresh_tracking_webhook_may_overwrite_tracking_code() {
        let mut existing = shipment_record(1);
        existing.status = Status::tracking_code("IT");

        let mut raw = payload("se-55", Some("1Z999"), Some("A100"));
        raw.tracking_status = Some("DE".to_string());
        raw.tracking_status_description = Some("Delivered".to_string());
        let normalized = normalize(&raw);

        let update = build_update(&existing, &normalized);
        assert_eq!(update.status, Some(Status::tracking_code("DE")));
        assert_eq!(update.status_description.as_deref(), Some("Delivered"));
    }

    #[test]
    fn absent_fields_are_omitted_from_write_set() {
        let existing = shipment_record(1);
        let mut raw = payload("se-55", None, None);
        raw.tracking_number = None;
        raw.order_number = None;
        raw.ship_to = None;
        raw.weight = None;
        let normalized = normalize(&raw);

        let update = build_update(&existing, &normalized);
        assert!(update.tracking_number.is_none());
        assert!(update.order_number.is_none());
        assert!(update.ship_to.is_none());
        assert!(update.weight_oz.is_none());
        // The raw payload itself is always refreshed.
        assert!(update.raw_payload.is_some());
    }

    #[test]
    fn merge_never_rewrites_order_fk() {
        let mut existing = shipment_record(1);
        existing.order_id = Some(900);
        let normalized = normalize(&payload("se-55", Some("1Z999"), Some("A100")));
        assert!(build_update(&existing, &normalized).order_id.is_none());
    }
}
