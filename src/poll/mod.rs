//! Cursor-based polling against the carrier, the safety net behind webhooks.

pub mod backfill;
pub mod cursor;
pub mod worker;

pub use backfill::{BackfillConfig, SweepSummary, TrackingBackfill};
pub use cursor::{SHIPMENT_STREAM, advance_watermark, load_or_seed};
pub use worker::{PollConfig, PollError, PollWorker, TickOutcome};
