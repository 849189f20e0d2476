use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventhub_server::config::Config;
use eventhub_server::images::DiskImageStore;
use eventhub_server::routes::create_routes;
use eventhub_server::state::AppState;
use eventhub_server::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,eventhub_server=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let store: Arc<dyn Store> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Successfully connected to database");

            sqlx::migrate!()
                .run(&pool)
                .await
                .expect("Failed to run migrations");

            tracing::info!("Migrations run successfully");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let images = Arc::new(DiskImageStore::new(
        config.image_upload_dir.clone(),
        config.image_public_base_url.clone(),
    ));

    let addr = config.server_addr;
    let state = AppState::new(config, store, images);

    if let Err(e) = state.bookings.reconcile_orphans().await {
        tracing::warn!(error = %e, "Orphaned booking sweep failed");
    }

    let app = create_routes(state);

    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
