//! ride-gateway server entry point.
//!
//! Connects to the store, hydrates the in-memory caches, spawns the
//! dispatcher worker, and serves the Axum router.

use std::sync::Arc;

use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ride_gateway::api;
use ride_gateway::app_state::AppState;
use ride_gateway::cache::CacheRegistry;
use ride_gateway::config::GatewayConfig;
use ride_gateway::dispatcher;
use ride_gateway::notifier::NotificationHub;
use ride_gateway::payment::PaymentClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting ride-gateway");

    // Connect to the store
    let connect_options = MySqlConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .username(&config.db_user)
        .password(&config.db_password)
        .database(&config.db_name);
    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_with(connect_options)
        .await?;

    // Hydrate the caches; a cold-start failure is fatal
    let cache = Arc::new(CacheRegistry::new());
    cache.hydrate(&pool).await?;
    tracing::info!("caches hydrated");

    // Notification hub and dispatcher worker
    let hub = Arc::new(NotificationHub::new());
    let (dispatcher_handle, dispatcher_worker) =
        dispatcher::channel(pool.clone(), Arc::clone(&cache), Arc::clone(&hub));
    tokio::spawn(dispatcher_worker.run());

    // Build application state
    let app_state = AppState {
        pool,
        cache,
        hub,
        dispatcher: dispatcher_handle,
        payment: PaymentClient::new(),
    };

    // Build router
    let app = api::build_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
