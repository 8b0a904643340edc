use realmgate_core::RandomIdGenerator;
use realmgate_platform_access::{MemoryDirectory, MemorySessionCache, Seed};
use realmgate_server::{auth::HttpOAuthGateway, build_router, build_state, config::ServerConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let seed = match &config.seed_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).expect("failed to read seed file");
            serde_json::from_str::<Seed>(&raw).expect("failed to parse seed file")
        }
        None => Seed::default(),
    };
    let directory = MemoryDirectory::from_seed(seed).expect("failed to load seed");
    tracing::info!(seeded = config.seed_path.is_some(), "Directory ready");

    // Spawn periodic purge of expired sessions
    let cache = Arc::new(MemorySessionCache::new());
    let cleanup_cache = cache.clone();
    let cleanup_interval = config.cleanup_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let count = cleanup_cache.purge_expired().await;
            if count > 0 {
                tracing::debug!(purged_sessions = count, "Periodic session cleanup");
            }
        }
    });

    let gateway = HttpOAuthGateway::new(config.provider_timeout())
        .expect("failed to build HTTP client");

    let state = build_state(
        &config,
        Arc::new(directory),
        cache,
        Arc::new(gateway),
        Arc::new(RandomIdGenerator),
    )
    .expect("failed to build application state");

    if config.local_admin {
        tracing::warn!("local-admin bootstrap is enabled");
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
