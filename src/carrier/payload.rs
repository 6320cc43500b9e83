//! Raw carrier payload types.
//!
//! These are the shapes the carrier system delivers, both in webhook bodies
//! and in poll pages. The carrier serializes with camelCase keys; every field
//! defaults so that partial payloads deserialize rather than fail; the merge
//! engine's "absent means leave alone" semantics depend on distinguishing
//! missing fields from present ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// A label element embedded in a carrier payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelInfo {
    pub label_id: Option<String>,
    pub voided: Option<bool>,
    pub tracking_number: Option<String>,
}

/// A line item as delivered by the carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayloadItem {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<u32>,
    pub unit_price: Option<f64>,
}

/// A tag as delivered by the carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayloadTag {
    pub tag_id: Option<i64>,
    pub name: Option<String>,
}

/// A packaging unit as delivered by the carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayloadPackage {
    pub code: Option<String>,
    pub weight_oz: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// Shipment weight as delivered by the carrier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayloadWeight {
    pub value: Option<f64>,
    pub units: Option<String>,
}

impl PayloadWeight {
    /// Normalizes to ounces. Unknown units are passed through unchanged;
    /// the carrier has only ever sent ounces, pounds, and grams.
    pub fn to_ounces(&self) -> Option<f64> {
        let value = self.value?;
        match self.units.as_deref() {
            Some("pounds") | Some("lb") => Some(value * 16.0),
            Some("grams") | Some("g") => Some(value / 28.349_523_125),
            _ => Some(value),
        }
    }
}

/// A raw carrier shipment payload.
///
/// This is the single input shape the merge engine reconciles, regardless of
/// whether it arrived via webhook, poll page, or a direct by-ID fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CarrierPayload {
    /// The carrier's shipment identifier (e.g. `se-123456`).
    pub shipment_id: Option<String>,

    pub tracking_number: Option<String>,

    /// The marketplace order number, when the carrier knows it.
    pub order_number: Option<String>,

    /// The carrier's own lifecycle status (`awaiting_shipment`, ...).
    pub shipment_status: Option<String>,

    /// A two-letter tracking status code, present only on tracking events.
    pub tracking_status: Option<String>,

    pub tracking_status_description: Option<String>,

    /// Explicit void flag on the shipment itself.
    pub voided: Option<bool>,

    pub labels: Option<Vec<LabelInfo>>,

    pub items: Option<Vec<PayloadItem>>,
    pub tags: Option<Vec<PayloadTag>>,
    pub packages: Option<Vec<PayloadPackage>>,

    pub ship_to: Option<Address>,

    pub weight: Option<PayloadWeight>,

    pub advanced_options: Option<serde_json::Value>,

    /// When the carrier last modified this shipment. Drives the poll cursor.
    pub modified_at: Option<DateTime<Utc>>,
}

impl CarrierPayload {
    /// Returns true if the shipment or any embedded label is voided.
    pub fn is_voided(&self) -> bool {
        if self.voided == Some(true) {
            return true;
        }
        self.labels
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|label| label.voided == Some(true))
    }
}

/// One page of the carrier's "list shipments modified between X and Y"
/// endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShipmentPage {
    pub shipments: Vec<CarrierPayload>,
    pub page: u32,
    pub pages: u32,
}

impl ShipmentPage {
    /// Returns true if pages remain after this one.
    pub fn has_more(&self) -> bool {
        self.page < self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_payload_deserializes_with_defaults() {
        let payload: CarrierPayload =
            serde_json::from_str(r#"{"shipmentId": "se-1", "trackingNumber": "1Z999"}"#).unwrap();
        assert_eq!(payload.shipment_id.as_deref(), Some("se-1"));
        assert_eq!(payload.tracking_number.as_deref(), Some("1Z999"));
        assert!(payload.order_number.is_none());
        assert!(payload.items.is_none());
    }

    #[test]
    fn voided_label_element_marks_payload_voided() {
        let payload: CarrierPayload = serde_json::from_str(
            r#"{"shipmentId": "se-1", "labels": [{"voided": false}, {"voided": true}]}"#,
        )
        .unwrap();
        assert!(payload.is_voided());
    }

    #[test]
    fn unvoided_payload_is_not_voided() {
        let payload: CarrierPayload =
            serde_json::from_str(r#"{"shipmentId": "se-1", "voided": false}"#).unwrap();
        assert!(!payload.is_voided());
    }

    #[test]
    fn weight_normalizes_pounds_to_ounces() {
        let weight = PayloadWeight {
            value: Some(2.0),
            units: Some("pounds".to_string()),
        };
        assert_eq!(weight.to_ounces(), Some(32.0));
    }

    #[test]
    fn page_has_more_when_not_last() {
        let page = ShipmentPage {
            shipments: vec![],
            page: 2,
            pages: 5,
        };
        assert!(page.has_more());

        let last = ShipmentPage {
            shipments: vec![],
            page: 5,
            pages: 5,
        };
        assert!(!last.has_more());
    }
}
