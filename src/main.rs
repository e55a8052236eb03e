use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod codegen;
mod config;
mod error;
mod handlers;
mod models;
mod registry;
mod service;
mod store;

#[cfg(test)]
mod testing;

use cache::{LinkCache, MemoryCache, NullCache, RedisCache};
use config::{AppConfig, CacheBackend};
use registry::UserLinkRegistry;
use service::MappingService;
use store::{LinkStore, MemoryStore, SqliteStore};

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub config: AppConfig,
    pub mappings: MappingService,
    pub registry: UserLinkRegistry,
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present; env vars may already be set
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hashlink=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("Starting hashlink on {}:{}", config.host, config.port);
    tracing::info!("Base URL: {}", config.base_url);

    // Store and cache connections live for the whole process.
    let store: Arc<dyn LinkStore> = if config.database_url == "memory" {
        tracing::warn!("Using the in-process store; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::connect(&config.database_url).await?)
    };
    let cache = open_cache(&config.cache_backend).await;

    let mappings = MappingService::new(store.clone(), cache, config.cache_ttl);
    let registry = UserLinkRegistry::new(store.clone(), mappings.clone(), config.cascade_concurrency);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState {
        config,
        mappings,
        registry,
    });

    // ── Serve ──────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Shut down cleanly");
    Ok(())
}

// ── Router ─────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/urls", post(handlers::api::create_url))
        .route(
            "/urls/:code",
            get(handlers::api::get_url).delete(handlers::api::delete_url),
        )
        .route("/users", post(handlers::api::create_user))
        .route(
            "/users/:id",
            get(handlers::api::get_user).delete(handlers::api::delete_user),
        );

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api", api_router)
        // Short-link redirect goes last so the fixed paths take priority
        .route("/:code", get(handlers::redirect::redirect))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Open the configured cache. A Redis connection failure falls back to
/// store-only mode rather than refusing to start.
async fn open_cache(backend: &CacheBackend) -> Arc<dyn LinkCache> {
    match backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::None => {
            tracing::info!("Cache disabled; serving from the store only");
            Arc::new(NullCache)
        }
        CacheBackend::Redis(url) => match RedisCache::connect(url).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                tracing::warn!("Redis unavailable ({:?}); serving from the store only", e);
                Arc::new(NullCache)
            }
        },
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
