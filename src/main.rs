//! student-wallet - Student Wallet Backend API
//!
//! Students hold a prepaid wallet they recharge through external payment
//! providers and spend on lectures. Every balance change appends a ledger
//! entry, and every domain event leaves through a transactional outbox.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use student_wallet::api::{self, AppState};
use student_wallet::gateway::PaymentGatewayRegistry;
use student_wallet::jobs::{OutboxRelay, OutboxRelayConfig};
use student_wallet::messaging::{InMemoryBroker, IntegrationConsumer, INBOUND_BINDINGS};
use student_wallet::{db, Config};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "student_wallet=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the application router
fn build_router(state: AppState) -> Router {
    let api_router = api::create_router();

    Router::new()
        // Health check
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing();

    // Load configuration
    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting student-wallet server");
    tracing::info!("Connecting to database...");

    // Create database pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    // Verify database schema
    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    // Messaging fabric: the outbox relay publishes through the broker and
    // the consumer reads from the inbound bindings
    let broker = Arc::new(InMemoryBroker::new());

    let inbound = broker.subscribe(INBOUND_BINDINGS).await;
    let consumer = IntegrationConsumer::new(
        pool.clone(),
        broker.clone(),
        config.default_currency.clone(),
    );
    let consumer_task = consumer.start(inbound);

    let relay = OutboxRelay::with_config(
        pool.clone(),
        broker.clone(),
        OutboxRelayConfig {
            poll_interval: Duration::from_secs(config.outbox_poll_interval_secs),
            batch_size: config.outbox_batch_size,
        },
    );
    let relay_task = relay.start();

    // Build router and start server
    let state = AppState {
        pool: pool.clone(),
        gateways: Arc::new(PaymentGatewayRegistry::standard(&config)),
        default_currency: config.default_currency.clone(),
    };
    let app = build_router(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    relay_task.abort();
    consumer_task.abort();
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
