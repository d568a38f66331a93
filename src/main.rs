use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenv::dotenv;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use glowcart_payments::api::{self, ApiState};
use glowcart_payments::config::AppConfig;
use glowcart_payments::database::store::{PaymentRecordStore, PgPaymentRecordStore};
use glowcart_payments::database::init_pool_from_config;
use glowcart_payments::gateways::registry::GatewayRegistry;
use glowcart_payments::health::HealthChecker;
use glowcart_payments::logging::init_tracing;
use glowcart_payments::middleware::logging::{request_logging_middleware, UuidRequestId};
use glowcart_payments::services::notification::{
    HttpEmailNotifier, LogOnlyNotifier, NotificationDispatcher,
};
use glowcart_payments::services::orders::{OrderService, PgOrderService};
use glowcart_payments::services::reconciliation::ReconciliationEngine;
use glowcart_payments::workers::expiry_sweep::{ExpirySweepConfig, ExpirySweepWorker};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "Starting glowcart payments service"
    );

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!("Initializing database connection pool...");
    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!(e)
    })?;
    info!("Database connection pool initialized");

    let registry = Arc::new(GatewayRegistry::from_env().map_err(|e| {
        error!("Failed to load payment gateway configuration: {}", e);
        anyhow::anyhow!(e)
    })?);
    info!("Payment gateways configured: momo, vnpay, zalopay");

    let store: Arc<dyn PaymentRecordStore> = Arc::new(PgPaymentRecordStore::new(db_pool.clone()));
    let orders: Arc<dyn OrderService> = Arc::new(PgOrderService::new(db_pool.clone()));

    let notifier: Arc<dyn NotificationDispatcher> = match &config.email {
        Some(email) => {
            info!(url = %email.service_url, "Email confirmations enabled");
            Arc::new(HttpEmailNotifier::new(email)?)
        }
        None => {
            info!("EMAIL_SERVICE_URL not set, payment confirmations will be log-only");
            Arc::new(LogOnlyNotifier)
        }
    };

    let engine = Arc::new(ReconciliationEngine::new(
        Arc::clone(&store),
        Arc::clone(&orders),
        notifier,
    ));

    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let sweep_enabled = std::env::var("EXPIRY_SWEEP_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .to_lowercase()
        != "false";
    let mut sweep_handle = None;
    if sweep_enabled {
        let sweep_config = ExpirySweepConfig::from_env();
        info!(
            sweep_interval_secs = sweep_config.sweep_interval.as_secs(),
            attempt_ttl_secs = sweep_config.attempt_ttl.as_secs(),
            "Starting payment expiry sweep worker"
        );
        let worker = ExpirySweepWorker::new(Arc::clone(&store), sweep_config);
        sweep_handle = Some(tokio::spawn(worker.run(worker_shutdown_rx)));
    } else {
        info!("Payment expiry sweep worker disabled (EXPIRY_SWEEP_ENABLED=false)");
    }

    let health_checker = HealthChecker::new(db_pool.clone());

    info!("Setting up application routes...");
    let state = ApiState {
        engine,
        registry,
        store,
        orders,
        health_checker,
    };
    let app: Router = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id()),
    );
    info!("Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening, ready to accept callbacks");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Some(handle) = sweep_handle {
        if let Err(e) = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await {
            error!(error = %e, "Timed out waiting for expiry sweep worker shutdown");
        }
    }

    info!("Server shutdown complete");

    Ok(())
}
