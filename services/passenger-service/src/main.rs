//! Passenger service HTTP server.
//!
//! Serves the cancellation RPC and the passenger/notification API, and
//! consumes baggage events when a broker is configured.

use airport_contract::BaggageStateChanged;
use airport_core::environment::SystemClock;
use airport_core::event_bus::EventBus;
use airport_redpanda::RedpandaEventBus;
use airport_runtime::DeadLetterQueue;
use airport_runtime::metrics::PrometheusMetrics;
use passenger_service::{
    AppState, BaggageEventHandler, Config, EventConsumer, HttpBaggageClient,
    InMemoryNotificationLedger, NotificationLedger, PassengerDirectory, build_router,
    metrics::register_business_metrics,
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.server.log_level)
                .unwrap_or_else(|_| "passenger_service=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Passenger Service");
    info!(
        bind = %config.bind_address(),
        brokers = ?config.redpanda.brokers,
        ledger_capacity = ?config.ledger_capacity,
        baggage_url = ?config.baggage.url,
        "Configuration loaded"
    );

    // Metrics
    let metrics = if config.server.metrics_enabled {
        let metrics = Arc::new(PrometheusMetrics::install()?);
        register_business_metrics();
        Some(metrics)
    } else {
        info!("Metrics disabled");
        None
    };

    // Ledger and directory
    let clock = Arc::new(SystemClock);
    let ledger: Arc<dyn NotificationLedger> = match config.ledger_capacity {
        Some(capacity) => Arc::new(InMemoryNotificationLedger::with_capacity(clock, capacity)),
        None => Arc::new(InMemoryNotificationLedger::new(clock)),
    };
    let directory = Arc::new(PassengerDirectory::new(ledger));

    // Baggage consumer
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let consumer = match &config.redpanda.brokers {
        Some(brokers) => {
            let event_bus: Arc<dyn EventBus> = Arc::new(
                RedpandaEventBus::builder()
                    .brokers(brokers)
                    .consumer_group(&config.redpanda.consumer_group)
                    .default_event_type(BaggageStateChanged::EVENT_TYPE)
                    .build()?,
            );
            let consumer = EventConsumer::builder()
                .name("baggage")
                .topics(vec![config.redpanda.baggage_topic.clone()])
                .event_bus(event_bus)
                .handler(Arc::new(BaggageEventHandler::new(Arc::clone(&directory))))
                .shutdown(shutdown_tx.subscribe())
                .dead_letters(DeadLetterQueue::new(config.redpanda.dlq_max_size))
                .build()?;
            info!(topic = %config.redpanda.baggage_topic, "Baggage consumer enabled");
            Some(consumer.spawn())
        },
        None => {
            warn!("REDPANDA_BROKERS not set, baggage consumer disabled");
            None
        },
    };

    // Start HTTP server
    let mut state = AppState::new(directory);
    match &config.baggage.url {
        Some(url) => {
            state = state.with_baggage(Arc::new(HttpBaggageClient::new(
                url,
                config.baggage_lookup_timeout(),
            )));
        },
        None => warn!("BAGGAGE_SERVICE_URL not set, baggage lookups disabled"),
    }
    let app = build_router(state, metrics);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the consumer
    let _ = shutdown_tx.send(());
    if let Some(handle) = consumer {
        match tokio::time::timeout(config.shutdown_timeout(), handle).await {
            Ok(Ok(())) => info!("Baggage consumer stopped"),
            Ok(Err(e)) => error!(error = %e, "Baggage consumer task failed"),
            Err(_) => warn!("Baggage consumer did not stop within the shutdown timeout"),
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
