//! Core domain types for the shipment reconciliation engine.

pub mod ids;
pub mod shipment;
pub mod status;

pub use ids::{CarrierShipmentId, JobId, OrderNumber, ShipmentId, TrackingNumber};
pub use shipment::{
    Address, DeadLetterEntry, DeadLetterReason, ShipmentItem, ShipmentPackage, ShipmentRecord,
    ShipmentTag,
};
pub use status::{ShipmentStatus, Status};
