//! The two-tier webhook processing queue.
//!
//! Inbound carrier events are decoupled from processing: the webhook
//! endpoint enqueues and returns immediately, and the [`QueueConsumer`]
//! drains in batches with strict high-before-low tier precedence.

pub mod consumer;
pub mod message;

pub use consumer::{ConsumerConfig, ConsumerTickSummary, QueueConsumer};
pub use message::{MAX_ATTEMPTS, QueuePriority, WebhookMessage};
