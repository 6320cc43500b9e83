//! The priority webhook queue consumer.
//!
//! On each consumption tick, up to `batch_size` messages are dequeued from
//! the high-priority tier; only when that tier is empty does the consumer
//! dequeue from low. This strict precedence is the anti-starvation
//! guarantee: raw carrier webhooks (which carry their own data) are never
//! stuck behind reverse-sync messages (which need an extra API fetch and are
//! latency-insensitive).
//!
//! Failed messages are re-appended to the *tail* of the same tier with an
//! incremented attempt count, preserving FIFO order within the tier, up to
//! [`MAX_ATTEMPTS`](crate::queue::message::MAX_ATTEMPTS).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::reconcile::ReconcileEngine;
use crate::store::{QueueStore, StoreError};
use crate::worker_status::WorkerStatus;

use super::message::QueuePriority;

/// Default interval between consumption ticks.
const DEFAULT_TICK_INTERVAL_SECS: u64 = 15;

/// Default number of messages dequeued per tick.
const DEFAULT_BATCH_SIZE: usize = 10;

/// Configuration for the queue consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub tick_interval: Duration,
    pub batch_size: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ConsumerConfig {
    /// Reads `SHIPSYNC_CONSUMER_INTERVAL_SECS` and `SHIPSYNC_CONSUMER_BATCH`;
    /// unset or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_u64("SHIPSYNC_CONSUMER_INTERVAL_SECS") {
            config.tick_interval = Duration::from_secs(secs);
        }
        if let Some(batch) = env_u64("SHIPSYNC_CONSUMER_BATCH") {
            config.batch_size = batch as usize;
        }
        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Summary of one consumption tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerTickSummary {
    /// Tier the batch was drawn from, if any messages were available.
    pub tier: Option<QueuePriority>,
    pub processed: usize,
    pub requeued: usize,
    pub dropped: usize,
}

/// Background consumer of the two-tier webhook queue.
pub struct QueueConsumer {
    queue: Arc<dyn QueueStore>,
    engine: Arc<ReconcileEngine>,
    config: ConsumerConfig,
    status: WorkerStatus,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        engine: Arc<ReconcileEngine>,
        config: ConsumerConfig,
    ) -> Self {
        QueueConsumer {
            queue,
            engine,
            config,
            status: WorkerStatus::new(),
        }
    }

    /// Handle for querying this consumer's state.
    pub fn status(&self) -> WorkerStatus {
        self.status.clone()
    }

    /// Runs one consumption tick.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<ConsumerTickSummary, StoreError> {
        let mut batch = self
            .queue
            .pop_batch(QueuePriority::High, self.config.batch_size)
            .await?;
        let tier = if batch.is_empty() {
            batch = self
                .queue
                .pop_batch(QueuePriority::Low, self.config.batch_size)
                .await?;
            QueuePriority::Low
        } else {
            QueuePriority::High
        };

        if batch.is_empty() {
            return Ok(ConsumerTickSummary::default());
        }

        let mut summary = ConsumerTickSummary {
            tier: Some(tier),
            ..Default::default()
        };

        for message in batch {
            match self.engine.reconcile(&message.payload, None).await {
                Ok(_) => summary.processed += 1,
                Err(e) => {
                    let retried = message.with_incremented_attempt();
                    if retried.is_exhausted() {
                        error!(
                            attempts = retried.attempts,
                            shipment_id = ?retried.payload.shipment_id,
                            error = %e,
                            "message exhausted delivery attempts; dropping"
                        );
                        summary.dropped += 1;
                    } else {
                        warn!(
                            attempts = retried.attempts,
                            shipment_id = ?retried.payload.shipment_id,
                            error = %e,
                            "reconcile failed; requeueing at tier tail"
                        );
                        // Tail append preserves FIFO within the tier.
                        if let Err(push_err) = self.queue.push(retried).await {
                            error!(error = %push_err, "requeue failed; message lost until next poll cycle");
                            summary.dropped += 1;
                        } else {
                            summary.requeued += 1;
                        }
                    }
                }
            }
        }

        debug!(?summary.tier, summary.processed, summary.requeued, summary.dropped, "consumption tick complete");
        Ok(summary)
    }

    /// Runs the consumer loop until cancelled.
    ///
    /// The `wake` channel lets the webhook path trigger an immediate tick
    /// instead of waiting out the interval.
    pub async fn run(&self, cancel: CancellationToken, mut wake: mpsc::Receiver<()>) {
        self.status.set_running(true);
        info!(interval = ?self.config.tick_interval, batch = self.config.batch_size, "queue consumer started");

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {},
                Some(_) = wake.recv() => {},
            }

            if let Err(e) = self.tick().await {
                warn!(error = %e, "consumption tick failed; will retry on next tick");
            }
            self.status.record_tick();
        }

        self.status.set_running(false);
        info!("queue consumer stopped");
    }
}
