//! HTTP server for the sync engine.
//!
//! # Endpoints
//!
//! - `POST /webhook/carrier` - Accepts signed carrier webhooks (returns 202
//!   Accepted after enqueueing; processing is asynchronous)
//! - `GET /health` - Returns 200 if the server is running

use std::sync::Arc;

use tokio::sync::mpsc;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::webhook_handler;

use crate::store::QueueStore;
use crate::webhooks::KeyResolver;

/// Shared application state, passed to handlers via axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// The durable webhook queue the endpoint enqueues into.
    queue: Arc<dyn QueueStore>,

    /// Resolver for carrier signing keys.
    keys: Arc<dyn KeyResolver>,

    /// Nudges the queue consumer after an enqueue.
    consumer_wake: mpsc::Sender<()>,
}

impl AppState {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        keys: Arc<dyn KeyResolver>,
        consumer_wake: mpsc::Sender<()>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                queue,
                keys,
                consumer_wake,
            }),
        }
    }

    pub fn queue(&self) -> &Arc<dyn QueueStore> {
        &self.inner.queue
    }

    pub fn keys(&self) -> &Arc<dyn KeyResolver> {
        &self.inner.keys
    }

    pub fn consumer_wake(&self) -> &mpsc::Sender<()> {
        &self.inner.consumer_wake
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook/carrier", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
