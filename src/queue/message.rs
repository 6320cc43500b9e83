//! The queued unit of work for inbound change events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::carrier::CarrierPayload;

/// Maximum delivery attempts before a message is dropped.
///
/// The merge engine is idempotent, so dropping after repeated failure loses
/// at most one stale snapshot; the next poll cycle re-fetches it.
pub const MAX_ATTEMPTS: u32 = 5;

/// Priority tier of a queued message.
///
/// High-priority messages are raw carrier webhooks (already carrying most of
/// the data, no extra API round-trip) plus backfill and manual triggers.
/// Low-priority messages are reverse-sync verifications, which always need an
/// extra API fetch and are latency-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePriority {
    High,
    Low,
}

/// A queued inbound change event.
///
/// Created on webhook receipt (high) or reverse-sync trigger (low);
/// destroyed on successful processing; requeued at the tail of the *same*
/// tier on transient failure, up to [`MAX_ATTEMPTS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub priority: QueuePriority,
    pub payload: CarrierPayload,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl WebhookMessage {
    pub fn new(priority: QueuePriority, payload: CarrierPayload) -> Self {
        WebhookMessage {
            priority,
            payload,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }

    /// Returns the message with the attempt count incremented, for requeueing.
    pub fn with_incremented_attempt(mut self) -> Self {
        self.attempts += 1;
        self
    }

    /// Returns true if the message has exhausted its delivery attempts.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= MAX_ATTEMPTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_preserves_tier_and_payload() {
        let payload = CarrierPayload {
            shipment_id: Some("se-1".to_string()),
            ..Default::default()
        };
        let msg = WebhookMessage::new(QueuePriority::Low, payload.clone());
        let retried = msg.with_incremented_attempt();
        assert_eq!(retried.attempts, 1);
        assert_eq!(retried.priority, QueuePriority::Low);
        assert_eq!(retried.payload, payload);
    }

    #[test]
    fn exhaustion_bound() {
        let msg = WebhookMessage::new(QueuePriority::High, CarrierPayload::default());
        let mut msg = msg;
        for _ in 0..MAX_ATTEMPTS {
            assert!(!msg.is_exhausted() || msg.attempts == MAX_ATTEMPTS);
            msg = msg.with_incremented_attempt();
        }
        assert!(msg.is_exhausted());
    }
}
