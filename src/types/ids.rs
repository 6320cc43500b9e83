//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using a
//! carrier shipment ID where a tracking number is expected) and make the code
//! more self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The internal shipment ledger row ID, owned by this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(pub u64);

impl fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shipment:{}", self.0)
    }
}

impl From<u64> for ShipmentId {
    fn from(n: u64) -> Self {
        ShipmentId(n)
    }
}

/// The carrier platform's own shipment identifier (e.g. `se-123456`).
///
/// Absent until the carrier creates a label for the shipment, which is why
/// placeholder records carry `None` here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarrierShipmentId(pub String);

impl CarrierShipmentId {
    pub fn new(s: impl Into<String>) -> Self {
        CarrierShipmentId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CarrierShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CarrierShipmentId {
    fn from(s: &str) -> Self {
        CarrierShipmentId(s.to_string())
    }
}

/// A carrier-issued tracking number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingNumber(pub String);

impl TrackingNumber {
    pub fn new(s: impl Into<String>) -> Self {
        TrackingNumber(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TrackingNumber {
    fn from(s: &str) -> Self {
        TrackingNumber(s.to_string())
    }
}

/// A marketplace order number, the join key to the separate order ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn new(s: impl Into<String>) -> Self {
        OrderNumber(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        OrderNumber(s.to_string())
    }
}

/// Identifier of a bulk job (e.g. a backfill run) for coordination ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(s: impl Into<String>) -> Self {
        JobId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipment_id_display_includes_prefix() {
        assert_eq!(ShipmentId(42).to_string(), "shipment:42");
    }

    #[test]
    fn string_ids_round_trip_through_serde() {
        let id = CarrierShipmentId::new("se-123456");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"se-123456\"");
        let back: CarrierShipmentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
