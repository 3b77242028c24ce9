//! Flight service HTTP server.
//!
//! Serves the flight API and calls the passenger service on cancellation.

use airport_core::environment::SystemClock;
use airport_runtime::metrics::PrometheusMetrics;
use flight_service::{
    AppState, Config, FlightAuthority, FlightEnvironment, HttpPassengerDirectoryClient,
    build_router, metrics::register_business_metrics,
};
use std::sync::Arc;
use tokio::signal;
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
                .unwrap_or_else(|_| "flight_service=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Flight Service");
    info!(
        bind = %config.bind_address(),
        passenger_service = %config.passenger_service.url,
        rpc_timeout = ?config.rpc_timeout(),
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

    // Flight authority
    let directory = HttpPassengerDirectoryClient::new(&config.passenger_service.url);
    info!(endpoint = %directory.endpoint(), "Passenger directory client ready");
    let authority = Arc::new(FlightAuthority::new(FlightEnvironment::new(
        Arc::new(SystemClock),
        Arc::new(directory),
        config.rpc_timeout(),
    )));

    // Start HTTP server
    let app = build_router(AppState::new(Arc::clone(&authority)), metrics);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let running fan-outs finish
    match authority.shutdown(config.shutdown_timeout()).await {
        Ok(()) => info!("Flight store drained"),
        Err(e) => warn!(error = %e, "Flight store shutdown incomplete"),
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
