//! Storage traits for the reconciliation engine.
//!
//! Persistence technology is a deployment concern; these traits are the
//! boundary. The in-memory implementations in [`memory`] back the test suite
//! and embedded deployments. All methods are async because production
//! implementations sit on a network.
//!
//! Every trait method returns [`StoreError`] on infrastructure failure;
//! callers treat those as failed-but-retryable per the error taxonomy
//! (nothing here aborts a batch).

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::queue::message::{QueuePriority, WebhookMessage};
use crate::types::{
    Address, CarrierShipmentId, DeadLetterEntry, OrderNumber, ShipmentId, ShipmentItem,
    ShipmentPackage, ShipmentRecord, ShipmentStatus, ShipmentTag, Status, TrackingNumber,
};

/// Errors surfaced by storage implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store is unreachable. Transient; the operation should be
    /// treated as failed-but-retryable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The stored data could not be decoded.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

/// Fields for creating a new shipment record.
#[derive(Debug, Clone, Default)]
pub struct NewShipment {
    pub carrier_shipment_id: Option<CarrierShipmentId>,
    pub tracking_number: Option<TrackingNumber>,
    pub order_number: Option<OrderNumber>,
    pub order_id: Option<u64>,
    pub status: Status,
    pub status_description: Option<String>,
    pub shipment_status: Option<ShipmentStatus>,
    pub ship_to: Option<Address>,
    pub weight_oz: Option<f64>,
    pub advanced_options: Option<serde_json::Value>,
    pub raw_payload: Option<serde_json::Value>,
    pub items: Vec<ShipmentItem>,
    pub tags: Vec<ShipmentTag>,
    pub packages: Vec<ShipmentPackage>,
}

/// A field-level update to an existing shipment record.
///
/// `None` means "leave the stored value alone" — this is how the merge
/// engine's "absent fields never null out known data" rule reaches storage.
#[derive(Debug, Clone, Default)]
pub struct ShipmentUpdate {
    pub carrier_shipment_id: Option<CarrierShipmentId>,
    pub tracking_number: Option<TrackingNumber>,
    pub order_number: Option<OrderNumber>,
    pub order_id: Option<u64>,
    pub status: Option<Status>,
    pub status_description: Option<String>,
    pub shipment_status: Option<ShipmentStatus>,
    pub ship_to: Option<Address>,
    pub weight_oz: Option<f64>,
    pub advanced_options: Option<serde_json::Value>,
    pub raw_payload: Option<serde_json::Value>,
}

/// The shipment table: the single shared mutable resource of the system.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    async fn get(&self, id: ShipmentId) -> Result<Option<ShipmentRecord>, StoreError>;

    /// All records carrying the given tracking number. More than one can
    /// exist after a carrier label re-issue.
    async fn find_by_tracking_number(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<Vec<ShipmentRecord>, StoreError>;

    async fn find_by_carrier_shipment_id(
        &self,
        carrier_shipment_id: &CarrierShipmentId,
    ) -> Result<Option<ShipmentRecord>, StoreError>;

    /// A placeholder row (no tracking number, no carrier ID) pre-created by
    /// the warehouse picking subsystem for this order.
    async fn find_placeholder_by_order_number(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Option<ShipmentRecord>, StoreError>;

    async fn insert(&self, shipment: NewShipment) -> Result<ShipmentId, StoreError>;

    /// Applies a field-level update. Fields set to `None` are left unchanged.
    async fn update(&self, id: ShipmentId, update: ShipmentUpdate) -> Result<(), StoreError>;

    /// Full-replaces the nested collections from the latest snapshot.
    async fn replace_collections(
        &self,
        id: ShipmentId,
        items: Vec<ShipmentItem>,
        tags: Vec<ShipmentTag>,
        packages: Vec<ShipmentPackage>,
    ) -> Result<(), StoreError>;

    /// Shipments marked `shipped` with no tracking number, created before
    /// `older_than`, excluding ones legitimately still pending a label
    /// (`label_purchased`, `on_hold`). Feeds the tracking-backfill sweep.
    async fn find_shipped_without_tracking(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ShipmentRecord>, StoreError>;
}

/// Read-only lookup into the separate order ledger. Never written by this
/// subsystem.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn find_order_id(&self, order_number: &OrderNumber) -> Result<Option<u64>, StoreError>;
}

/// Persisted watermark per sync stream.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self, stream: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn save(&self, stream: &str, watermark: DateTime<Utc>) -> Result<(), StoreError>;

    /// Erases the watermark so the next tick re-seeds. Used for a full
    /// resync, the one sanctioned non-monotonic transition.
    async fn reset(&self, stream: &str) -> Result<(), StoreError>;
}

/// Holds payloads that could not be matched to any order, for manual triage.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn push(&self, entry: DeadLetterEntry) -> Result<(), StoreError>;
}

/// Shared key-value store backing the coordination service.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Atomic set-if-absent with expiry. Returns `true` if the key was set,
    /// `false` if a live value already exists.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Returns the live (unexpired) value for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// The durable two-tier webhook queue.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Appends a message to the tail of its tier.
    async fn push(&self, message: WebhookMessage) -> Result<(), StoreError>;

    /// Removes and returns up to `max` messages from the head of `tier`,
    /// preserving insertion order.
    async fn pop_batch(
        &self,
        tier: QueuePriority,
        max: usize,
    ) -> Result<Vec<WebhookMessage>, StoreError>;

    async fn depth(&self, tier: QueuePriority) -> Result<usize, StoreError>;
}
