//! Status vocabularies for the shipment ledger.
//!
//! Two distinct vocabularies coexist on a shipment record:
//!
//! - The lifecycle-facing [`Status`]: a short code that is either one of the
//!   editable lifecycle codes (`pending`, `new`, `shipped`, `cancelled`,
//!   `label_purchased`, `on_hold`) or a two-letter carrier tracking code
//!   (`AC`, `IT`, `DE`, `UN`, `EX`, `NY`, `SP`, ...). Once a record holds a
//!   carrier tracking code, no synchronization write may overwrite it; only
//!   a fresh tracking webhook may.
//! - The warehouse-facing [`ShipmentStatus`]: the carrier's own lifecycle
//!   state for the shipment (`on_hold`, `awaiting_shipment`,
//!   `label_purchased`, `cancelled`, `shipped`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle codes that synchronization writes are allowed to overwrite.
const EDITABLE_CODES: &[&str] = &[
    "new",
    "shipped",
    "pending",
    "cancelled",
    "label_purchased",
    "on_hold",
];

/// The lifecycle-facing status code of a shipment.
///
/// Either an editable lifecycle code or a carrier tracking code. Tracking
/// codes are stored upper-cased exactly as the carrier asserts them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(String);

impl Status {
    /// Wraps a raw status code. Lifecycle codes are expected lower-case,
    /// tracking codes upper-case; this constructor does not normalize.
    pub fn new(code: impl Into<String>) -> Self {
        Status(code.into())
    }

    /// Wraps a carrier-asserted tracking code, upper-casing it.
    pub fn tracking_code(code: &str) -> Self {
        Status(code.to_ascii_uppercase())
    }

    pub fn pending() -> Self {
        Status("pending".to_string())
    }

    pub fn new_shipment() -> Self {
        Status("new".to_string())
    }

    pub fn shipped() -> Self {
        Status("shipped".to_string())
    }

    pub fn cancelled() -> Self {
        Status("cancelled".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if synchronization writes may overwrite this status.
    pub fn is_editable(&self) -> bool {
        EDITABLE_CODES.contains(&self.0.as_str())
    }

    /// Returns true if this status holds a carrier tracking code.
    ///
    /// Anything outside the editable lifecycle set is treated as a carrier
    /// tracking code: the protection must hold for codes the carrier adds
    /// in the future, not just the known two-letter set.
    pub fn is_carrier_tracking_code(&self) -> bool {
        !self.is_editable()
    }
}

impl Default for Status {
    /// `new`: the code the sync paths assign when the carrier asserts
    /// nothing stronger.
    fn default() -> Self {
        Status::new_shipment()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The warehouse-facing shipment status, in the carrier's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    OnHold,
    AwaitingShipment,
    LabelPurchased,
    Cancelled,
    Shipped,
}

impl ShipmentStatus {
    /// Parses the carrier's wire spelling. Unknown values return `None`
    /// rather than an error; the raw payload is preserved regardless.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "on_hold" => Some(ShipmentStatus::OnHold),
            "awaiting_shipment" => Some(ShipmentStatus::AwaitingShipment),
            "label_purchased" => Some(ShipmentStatus::LabelPurchased),
            "cancelled" => Some(ShipmentStatus::Cancelled),
            "shipped" => Some(ShipmentStatus::Shipped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::OnHold => "on_hold",
            ShipmentStatus::AwaitingShipment => "awaiting_shipment",
            ShipmentStatus::LabelPurchased => "label_purchased",
            ShipmentStatus::Cancelled => "cancelled",
            ShipmentStatus::Shipped => "shipped",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
