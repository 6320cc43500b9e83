//! Record matching: resolving a carrier payload to an existing ledger row.
//!
//! Three identity systems can name the same physical shipment: the tracking
//! number, the carrier's shipment ID, and an internally-generated placeholder
//! row keyed by order number. The priority search below reconciles them;
//! first match wins.

use tracing::debug;

use crate::store::{ShipmentStore, StoreError};
use crate::types::ShipmentRecord;

use super::normalize::NormalizedShipment;

/// Resolves a normalized payload to zero or one existing shipment record.
///
/// Matching priority:
///
/// 1. **Tracking number**: accepted only if the candidate's carrier
///    shipment ID is absent (a placeholder) or equal to the incoming one.
///    A candidate bound to a *different* carrier shipment ID means the
///    carrier re-issued a label number for a physically distinct shipment;
///    merging would conflate two shipments, so the search falls through.
/// 2. **Carrier shipment ID**: exact match on the carrier's identifier.
/// 3. **Placeholder by order number**: a row the warehouse picking
///    subsystem pre-created with no tracking number and no carrier ID.
pub async fn find_existing(
    store: &dyn ShipmentStore,
    normalized: &NormalizedShipment,
) -> Result<Option<ShipmentRecord>, StoreError> {
    if let Some(tracking_number) = &normalized.tracking_number {
        let candidates = store.find_by_tracking_number(tracking_number).await?;
        for candidate in candidates {
            let compatible = match (&candidate.carrier_shipment_id, &normalized.carrier_shipment_id)
            {
                (None, _) => true,
                (Some(existing), Some(incoming)) => existing == incoming,
                // Candidate is bound to a carrier shipment but the payload
                // names none; without the ID we cannot rule out a re-issue.
                (Some(_), None) => false,
            };
            if compatible {
                debug!(shipment = %candidate.id, %tracking_number, "matched by tracking number");
                return Ok(Some(candidate));
            }
            debug!(
                shipment = %candidate.id,
                %tracking_number,
                "tracking number re-use with different carrier id; falling through"
            );
        }
    }

    if let Some(carrier_shipment_id) = &normalized.carrier_shipment_id {
        if let Some(record) = store
            .find_by_carrier_shipment_id(carrier_shipment_id)
            .await?
        {
            debug!(shipment = %record.id, %carrier_shipment_id, "matched by carrier shipment id");
            return Ok(Some(record));
        }
    }

    if let Some(order_number) = &normalized.order_number {
        if let Some(record) = store.find_placeholder_by_order_number(order_number).await? {
            debug!(shipment = %record.id, %order_number, "matched placeholder by order number");
            return Ok(Some(record));
        }
    }

    Ok(None)
}
