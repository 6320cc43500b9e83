//! The record matching & merge engine.
//!
//! Given a raw carrier payload, resolves it to zero or one existing internal
//! shipment record via a priority search, builds a normalized record, and
//! performs a protected field-level merge: carrier-assigned statuses are
//! never regressed, absent fields never null out known data, and nested
//! collections are fully replaced with split/merge detection.

pub mod engine;
pub mod items;
pub mod matching;
pub mod merge;
pub mod normalize;

pub use engine::{ReconcileEngine, ReconcileError, ReconcileOutcome};
pub use items::{composition_changed, item_fingerprint};
pub use normalize::{NormalizedShipment, derive_status, normalize};
