//! Field Ticket - Rust/Axum core service
//!
//! Hosts the crude oil measurement calculator and the offline mutation queue
//! that sits between the ticket app and the field ticket API.

use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod config;
mod error;
pub mod measurement;
pub mod offline;
#[cfg(test)]
mod testing;

use cache::AppCache;
use config::{Config, QueueStoreKind};
use offline::{
    run_sync_worker, spawn_connectivity_probe, spawn_online_listener, sync_channel, Connectivity,
    HttpGateway, MemoryQueueStore, NetworkGateway, OfflineGateway, OfflineQueue, OriginResolver,
    PgQueueStore, QueueStore, Replayer, SyncTrigger, SYNC_TAG,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: AppCache,
    pub gateway: Arc<OfflineGateway>,
    pub queue: Arc<OfflineQueue>,
    pub connectivity: Connectivity,
    pub sync: SyncTrigger,
    pub origins: OriginResolver,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldticket_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let origins = OriginResolver::parse(&config.api_origin)?;

    let store: Arc<dyn QueueStore> = match config.queue_store {
        QueueStoreKind::Postgres => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&config.database_url)
                .await?;
            let store = PgQueueStore::new(pool);
            store.ensure_schema().await?;
            tracing::info!("Database connected successfully");
            Arc::new(store)
        }
        QueueStoreKind::Memory => {
            tracing::warn!("Using in-memory request queue; queued requests are lost on restart");
            Arc::new(MemoryQueueStore::new())
        }
    };

    let network: Arc<dyn NetworkGateway> = Arc::new(HttpGateway::new(config.upstream_timeout)?);
    let cache = AppCache::new(config.response_cache_capacity);
    let connectivity = Connectivity::new(true);
    let queue = Arc::new(OfflineQueue::new(store.clone()));
    let (sync, sync_rx) = sync_channel();
    let gateway = Arc::new(OfflineGateway::new(
        network.clone(),
        queue.clone(),
        cache.clone(),
        connectivity.clone(),
        sync.clone(),
    ));

    // Replay worker: the only consumer of sync events
    let replayer = Arc::new(Replayer::new(store.clone(), network.clone(), config.replay_delay));
    tokio::spawn(run_sync_worker(sync_rx, replayer));
    spawn_online_listener(&connectivity, sync.clone());

    match (config.probe_interval, config.probe_url.clone()) {
        (Some(interval), Some(url)) => {
            tracing::info!("Probing {} every {:?}", url, interval);
            spawn_connectivity_probe(connectivity.clone(), network.clone(), url, interval);
        }
        _ => tracing::info!("Connectivity probe disabled"),
    }

    // Deliver anything left over from a previous run
    let pending = store.len().await?;
    if pending > 0 {
        tracing::info!(pending, "Found queued requests from a previous run");
        sync.register(SYNC_TAG);
    }

    let state = AppState {
        cache,
        gateway,
        queue,
        connectivity,
        sync,
        origins,
    };

    // Build router
    let app = Router::new()
        // Health check and cache stats
        .route("/health", get(health_check))
        .route("/health/cache", get(cache_stats))
        // Measurement calculator API
        .nest("/api/measurement", measurement::router())
        // Offline proxy and queue administration
        .nest("/api", offline::router())
        // State and middleware
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let online = state.connectivity.is_online();
    match state.queue.store().check().await {
        Ok(()) => Json(serde_json::json!({
            "status": "healthy",
            "queue_store": "connected",
            "online": online,
            "service": "fieldticket-core"
        })),
        Err(e) => {
            tracing::error!("Queue store health check failed: {}", e);
            Json(serde_json::json!({
                "status": "unhealthy",
                "queue_store": "disconnected",
                "online": online,
                "error": e.to_string()
            }))
        }
    }
}

/// Cache statistics endpoint
async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.cache.stats())
}
