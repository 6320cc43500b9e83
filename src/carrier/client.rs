//! The carrier API surface consumed by the sync engine.
//!
//! The sync engine only ever reads from the carrier: the paginated
//! modified-between listing (poll path) and the by-ID fetch (tracking
//! backfill, reverse sync). Label creation is deliberately absent; creating
//! shipments from this side risks duplicating them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::CarrierShipmentId;

use super::error::CarrierApiError;
use super::payload::{CarrierPayload, ShipmentPage};

/// A half-open time window for the modified-between query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QueryWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        QueryWindow { start, end }
    }
}

/// Read-only client for the carrier REST API.
///
/// Implementations must be safe for concurrent use; the poll worker and the
/// backfill sweep may both hold the client.
#[async_trait]
pub trait CarrierApi: Send + Sync {
    /// Fetches one page of shipments modified within `window`.
    ///
    /// Pages are 1-indexed, matching the carrier's convention.
    async fn list_shipments(
        &self,
        window: QueryWindow,
        page: u32,
    ) -> Result<ShipmentPage, CarrierApiError>;

    /// Fetches a single shipment by the carrier's identifier.
    ///
    /// Returns `Ok(None)` when the carrier does not know the shipment
    /// (deleted or never existed), which is not an error for callers.
    async fn get_shipment(
        &self,
        id: &CarrierShipmentId,
    ) -> Result<Option<CarrierPayload>, CarrierApiError>;
}
