//! Inbound carrier event classification.

use serde::Deserialize;

use crate::carrier::CarrierPayload;

/// The kind of change a carrier webhook announces, parsed from the
/// payload's `resource_type`.
///
/// Unknown kinds are carried through rather than rejected: the merge engine
/// treats every payload uniformly as a shipment snapshot, so an event kind
/// added by the carrier tomorrow still syncs today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarrierEventKind {
    Shipped,
    Rejected,
    TrackingUpdate,
    BatchCompleted,
    Other(String),
}

impl CarrierEventKind {
    pub fn parse(resource_type: &str) -> Self {
        match resource_type.to_ascii_lowercase().as_str() {
            "shipped" => CarrierEventKind::Shipped,
            "rejected" => CarrierEventKind::Rejected,
            "track" => CarrierEventKind::TrackingUpdate,
            "batch" => CarrierEventKind::BatchCompleted,
            other => CarrierEventKind::Other(other.to_string()),
        }
    }
}

/// The body of a carrier webhook request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub resource_type: Option<String>,
    pub shipment: CarrierPayload,
}

impl WebhookEnvelope {
    pub fn kind(&self) -> CarrierEventKind {
        match self.resource_type.as_deref() {
            Some(rt) => CarrierEventKind::parse(rt),
            None => CarrierEventKind::Other(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_parse_case_insensitively() {
        assert_eq!(CarrierEventKind::parse("TRACK"), CarrierEventKind::TrackingUpdate);
        assert_eq!(CarrierEventKind::parse("shipped"), CarrierEventKind::Shipped);
        assert_eq!(CarrierEventKind::parse("rejected"), CarrierEventKind::Rejected);
        assert_eq!(CarrierEventKind::parse("batch"), CarrierEventKind::BatchCompleted);
    }

    #[test]
    fn unknown_kind_is_preserved_not_rejected() {
        assert_eq!(
            CarrierEventKind::parse("return_label"),
            CarrierEventKind::Other("return_label".to_string())
        );
    }

    #[test]
    fn envelope_parses_with_nested_shipment() {
        let body = r#"{
            "resourceType": "track",
            "shipment": {"shipmentId": "se-55", "trackingNumber": "1Z999"}
        }"#;
        let envelope: WebhookEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.kind(), CarrierEventKind::TrackingUpdate);
        assert_eq!(envelope.shipment.shipment_id.as_deref(), Some("se-55"));
    }
}
