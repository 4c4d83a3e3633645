use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use relay_channel::{ChannelConfig, StoreCredentials, WhatsAppCloudAdapter};
use relay_db::{DeliveryStore, PgDeliveryStore};
use relay_storage::{MediaConfig, MediaStagingService};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_api::background::completion_sweep;
use relay_api::config::ServerConfig;
use relay_api::router::build_app_router;
use relay_api::state::AppState;
use relay_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = relay_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    relay_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    relay_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store: Arc<dyn DeliveryStore> = Arc::new(PgDeliveryStore::new(pool));

    // --- Channel ---
    let channel_config = ChannelConfig::from_env();
    tracing::info!(api_base_url = %channel_config.api_base_url, "Loaded channel configuration");
    let credentials = Arc::new(StoreCredentials::new(Arc::clone(&store)));
    let channel = Arc::new(
        WhatsAppCloudAdapter::new(channel_config, credentials)
            .expect("Failed to build channel HTTP client"),
    );

    // --- Media staging ---
    let media_config = MediaConfig::from_env();
    let staging = Arc::new(MediaStagingService::new(media_config.build_store().await));

    // --- App state ---
    let state = AppState::new(store, channel, staging, config.clone());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&state.ws_manager));

    // --- Completion sweep ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(completion_sweep::run(
        Arc::clone(&state.projector),
        Arc::clone(&state.aggregator),
        completion_sweep::SWEEP_INTERVAL,
        sweep_cancel.clone(),
    ));

    let dispatcher = Arc::clone(&state.dispatcher);
    let projector = Arc::clone(&state.projector);
    let ws_manager = Arc::clone(&state.ws_manager);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    tracing::info!("Completion sweep stopped");

    // Unstarted sends stay queued; in-flight ones finish on their own.
    let paused = dispatcher.pause_all();
    tracing::info!(paused, "Paused running dispatches");

    projector.close_all();

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
