use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shipsync::carrier::HttpCarrierClient;
use shipsync::config::AppConfig;
use shipsync::coordination::CoordinationService;
use shipsync::lifecycle::LifecycleNotifier;
use shipsync::poll::{BackfillConfig, PollConfig, PollWorker, TrackingBackfill};
use shipsync::queue::{ConsumerConfig, QueueConsumer};
use shipsync::reconcile::ReconcileEngine;
use shipsync::server::{AppState, build_router};
use shipsync::store::memory::{
    MemoryCursorStore, MemoryDeadLetterStore, MemoryKeyValueStore, MemoryOrderLedger,
    MemoryQueueStore, MemoryShipmentStore,
};
use shipsync::webhooks::KeySetCache;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipsync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    // In-memory backing stores; persistence technology is a deployment
    // concern behind the store traits.
    let shipments = Arc::new(MemoryShipmentStore::new());
    let orders = Arc::new(MemoryOrderLedger::new());
    let dead_letters = Arc::new(MemoryDeadLetterStore::new());
    let cursors = Arc::new(MemoryCursorStore::new());
    let kv = Arc::new(MemoryKeyValueStore::new());
    let queue = Arc::new(MemoryQueueStore::new());

    let (lifecycle, mut lifecycle_rx) = LifecycleNotifier::channel();
    tokio::spawn(async move {
        // Hook for the external packaging/lifecycle engine; logged until one
        // is attached.
        while let Some(signal) = lifecycle_rx.recv().await {
            info!(
                shipment = %signal.shipment_id,
                order = ?signal.order_number,
                trigger = ?signal.trigger,
                "lifecycle signal"
            );
        }
    });

    let engine = Arc::new(ReconcileEngine::new(
        shipments.clone(),
        orders,
        dead_letters,
        lifecycle,
    ));

    let coordination = CoordinationService::new(kv);
    coordination.clear_all().await;

    let carrier = Arc::new(HttpCarrierClient::new(
        config.carrier_base_url.clone(),
        config.carrier_api_key.clone(),
    ));

    let cancel = CancellationToken::new();
    let (wake_tx, wake_rx) = mpsc::channel(16);

    let consumer = QueueConsumer::new(queue.clone(), engine.clone(), ConsumerConfig::from_env());
    let consumer_cancel = cancel.clone();
    let consumer_task = tokio::spawn(async move { consumer.run(consumer_cancel, wake_rx).await });

    let backfill = TrackingBackfill::new(
        shipments.clone(),
        carrier.clone(),
        engine.clone(),
        BackfillConfig::default(),
    );
    let poll_worker = PollWorker::new(
        carrier,
        engine,
        cursors,
        coordination,
        backfill,
        PollConfig::from_env(),
    );
    let poll_cancel = cancel.clone();
    let poll_task = tokio::spawn(async move { poll_worker.run(poll_cancel).await });

    let keys = Arc::new(KeySetCache::new(
        config.key_set_url.clone(),
        reqwest::Client::new(),
    ));
    let app = build_router(AppState::new(queue, keys, wake_tx));

    info!(addr = %config.bind_addr, "listening");
    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %config.bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };

    let shutdown = cancel.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown.cancelled().await;
    });

    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    cancel.cancel();
    let _ = consumer_task.await;
    let _ = poll_task.await;
    info!("shutdown complete");
}
