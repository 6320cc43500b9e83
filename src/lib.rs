//! Shipment ledger synchronization against a carrier fulfillment platform.
//!
//! Two independently-running ingestion paths, signed carrier webhooks (push)
//! and a cursor-based poll worker (pull), converge on one record matching &
//! merge engine, giving eventual crash-safe consistency without ever
//! regressing a carrier-assigned tracking status.

pub mod carrier;
pub mod config;
pub mod coordination;
pub mod lifecycle;
pub mod poll;
pub mod queue;
pub mod reconcile;
pub mod server;
pub mod store;
pub mod types;
pub mod webhooks;
pub mod worker_status;

#[cfg(test)]
pub mod test_utils;
