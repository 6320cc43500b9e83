//! In-memory implementations of the storage traits.
//!
//! These back the test suite and embedded deployments. Each store supports
//! fault injection (`set_unavailable`) so tests can exercise the
//! unreachable-store paths: lock fail-safety, per-item batch failures, and
//! cursor capping.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::queue::message::{QueuePriority, WebhookMessage};
use crate::types::{
    CarrierShipmentId, DeadLetterEntry, OrderNumber, ShipmentId, ShipmentItem, ShipmentPackage,
    ShipmentRecord, ShipmentStatus, ShipmentTag, TrackingNumber,
};

use super::{
    CursorStore, DeadLetterStore, KeyValueStore, NewShipment, OrderLedger, QueueStore,
    ShipmentStore, ShipmentUpdate, StoreError,
};

fn unavailable() -> StoreError {
    StoreError::Unavailable("memory store marked unavailable".to_string())
}

/// In-memory shipment table.
#[derive(Default)]
pub struct MemoryShipmentStore {
    records: RwLock<HashMap<ShipmentId, ShipmentRecord>>,
    /// Carrier shipment IDs whose writes fail, for batch-failure tests.
    poisoned: RwLock<HashSet<CarrierShipmentId>>,
    next_id: AtomicU64,
    down: AtomicBool,
}

impl MemoryShipmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Makes writes touching this carrier shipment ID fail.
    pub async fn poison(&self, id: CarrierShipmentId) {
        self.poisoned.write().await.insert(id);
    }

    pub async fn unpoison(&self, id: &CarrierShipmentId) {
        self.poisoned.write().await.remove(id);
    }

    /// Directly seeds a record, bypassing the merge engine. Test helper.
    pub async fn seed(&self, record: ShipmentRecord) {
        let id = record.id;
        self.next_id.fetch_max(id.0 + 1, Ordering::SeqCst);
        self.records.write().await.insert(id, record);
    }

    pub async fn all(&self) -> Vec<ShipmentRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        records
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }

    fn check_up(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }

    async fn check_poison(&self, id: &Option<CarrierShipmentId>) -> Result<(), StoreError> {
        if let Some(id) = id {
            if self.poisoned.read().await.contains(id) {
                return Err(StoreError::Unavailable(format!(
                    "write rejected for {id} (poisoned)"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ShipmentStore for MemoryShipmentStore {
    async fn get(&self, id: ShipmentId) -> Result<Option<ShipmentRecord>, StoreError> {
        self.check_up()?;
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_tracking_number(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<Vec<ShipmentRecord>, StoreError> {
        self.check_up()?;
        let mut found: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.tracking_number.as_ref() == Some(tracking_number))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id);
        Ok(found)
    }

    async fn find_by_carrier_shipment_id(
        &self,
        carrier_shipment_id: &CarrierShipmentId,
    ) -> Result<Option<ShipmentRecord>, StoreError> {
        self.check_up()?;
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.carrier_shipment_id.as_ref() == Some(carrier_shipment_id))
            .cloned())
    }

    async fn find_placeholder_by_order_number(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Option<ShipmentRecord>, StoreError> {
        self.check_up()?;
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.is_placeholder() && r.order_number.as_ref() == Some(order_number))
            .cloned())
    }

    async fn insert(&self, shipment: NewShipment) -> Result<ShipmentId, StoreError> {
        self.check_up()?;
        self.check_poison(&shipment.carrier_shipment_id).await?;
        let id = ShipmentId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let record = ShipmentRecord {
            id,
            carrier_shipment_id: shipment.carrier_shipment_id,
            tracking_number: shipment.tracking_number,
            order_number: shipment.order_number,
            order_id: shipment.order_id,
            status: shipment.status,
            status_description: shipment.status_description,
            shipment_status: shipment.shipment_status,
            ship_to: shipment.ship_to,
            weight_oz: shipment.weight_oz,
            advanced_options: shipment.advanced_options,
            raw_payload: shipment.raw_payload,
            items: shipment.items,
            tags: shipment.tags,
            packages: shipment.packages,
            created_at: now,
            updated_at: now,
        };
        self.records.write().await.insert(id, record);
        Ok(id)
    }

    async fn update(&self, id: ShipmentId, update: ShipmentUpdate) -> Result<(), StoreError> {
        self.check_up()?;
        self.check_poison(&update.carrier_shipment_id).await?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(cid) = &record.carrier_shipment_id {
            if self.poisoned.read().await.contains(cid) {
                return Err(StoreError::Unavailable(format!(
                    "write rejected for {id} (poisoned)"
                )));
            }
        }

        if let Some(v) = update.carrier_shipment_id {
            record.carrier_shipment_id = Some(v);
        }
        if let Some(v) = update.tracking_number {
            record.tracking_number = Some(v);
        }
        if let Some(v) = update.order_number {
            record.order_number = Some(v);
        }
        if let Some(v) = update.order_id {
            record.order_id = Some(v);
        }
        if let Some(v) = update.status {
            record.status = v;
        }
        if let Some(v) = update.status_description {
            record.status_description = Some(v);
        }
        if let Some(v) = update.shipment_status {
            record.shipment_status = Some(v);
        }
        if let Some(v) = update.ship_to {
            record.ship_to = Some(v);
        }
        if let Some(v) = update.weight_oz {
            record.weight_oz = Some(v);
        }
        if let Some(v) = update.advanced_options {
            record.advanced_options = Some(v);
        }
        if let Some(v) = update.raw_payload {
            record.raw_payload = Some(v);
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn replace_collections(
        &self,
        id: ShipmentId,
        items: Vec<ShipmentItem>,
        tags: Vec<ShipmentTag>,
        packages: Vec<ShipmentPackage>,
    ) -> Result<(), StoreError> {
        self.check_up()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.items = items;
        record.tags = tags;
        record.packages = packages;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn find_shipped_without_tracking(
        &self,
        older_than: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ShipmentRecord>, StoreError> {
        self.check_up()?;
        let mut found: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| {
                r.status.as_str() == "shipped"
                    && r.tracking_number.is_none()
                    && r.created_at < older_than
                    && !matches!(
                        r.shipment_status,
                        Some(ShipmentStatus::LabelPurchased) | Some(ShipmentStatus::OnHold)
                    )
            })
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at);
        found.truncate(limit);
        Ok(found)
    }
}

/// In-memory order ledger.
#[derive(Default)]
pub struct MemoryOrderLedger {
    orders: RwLock<HashMap<OrderNumber, u64>>,
    down: AtomicBool,
}

impl MemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, order_number: OrderNumber, order_id: u64) {
        self.orders.write().await.insert(order_number, order_id);
    }

    pub fn set_unavailable(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderLedger for MemoryOrderLedger {
    async fn find_order_id(&self, order_number: &OrderNumber) -> Result<Option<u64>, StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.orders.read().await.get(order_number).copied())
    }
}

/// In-memory cursor store.
#[derive(Default)]
pub struct MemoryCursorStore {
    cursors: RwLock<HashMap<String, DateTime<Utc>>>,
    down: AtomicBool,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self, stream: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.check_up()?;
        Ok(self.cursors.read().await.get(stream).copied())
    }

    async fn save(&self, stream: &str, watermark: DateTime<Utc>) -> Result<(), StoreError> {
        self.check_up()?;
        self.cursors
            .write()
            .await
            .insert(stream.to_string(), watermark);
        Ok(())
    }

    async fn reset(&self, stream: &str) -> Result<(), StoreError> {
        self.check_up()?;
        self.cursors.write().await.remove(stream);
        Ok(())
    }
}

/// In-memory dead-letter store.
#[derive(Default)]
pub struct MemoryDeadLetterStore {
    entries: RwLock<Vec<DeadLetterEntry>>,
}

impl MemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl DeadLetterStore for MemoryDeadLetterStore {
    async fn push(&self, entry: DeadLetterEntry) -> Result<(), StoreError> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

/// In-memory key-value store with TTL expiry.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
    down: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a coordination-store outage.
    pub fn set_unavailable(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Forces a key to expire, as if its TTL elapsed. Test helper.
    pub async fn expire(&self, key: &str) {
        self.values.write().await.remove(key);
    }

    fn check_up(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check_up()?;
        let now = Utc::now();
        let mut values = self.values.write().await;
        if let Some((_, expires_at)) = values.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }
        let expires_at = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| StoreError::Corrupt(format!("ttl out of range: {e}")))?;
        values.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_up()?;
        let now = Utc::now();
        Ok(self
            .values
            .read()
            .await
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_up()?;
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// In-memory two-tier FIFO queue.
#[derive(Default)]
pub struct MemoryQueueStore {
    high: RwLock<VecDeque<WebhookMessage>>,
    low: RwLock<VecDeque<WebhookMessage>>,
    down: AtomicBool,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }

    fn tier(&self, tier: QueuePriority) -> &RwLock<VecDeque<WebhookMessage>> {
        match tier {
            QueuePriority::High => &self.high,
            QueuePriority::Low => &self.low,
        }
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn push(&self, message: WebhookMessage) -> Result<(), StoreError> {
        self.check_up()?;
        self.tier(message.priority).write().await.push_back(message);
        Ok(())
    }

    async fn pop_batch(
        &self,
        tier: QueuePriority,
        max: usize,
    ) -> Result<Vec<WebhookMessage>, StoreError> {
        self.check_up()?;
        let mut queue = self.tier(tier).write().await;
        let take = max.min(queue.len());
        Ok(queue.drain(..take).collect())
    }

    async fn depth(&self, tier: QueuePriority) -> Result<usize, StoreError> {
        self.check_up()?;
        Ok(self.tier(tier).read().await.len())
    }
}
