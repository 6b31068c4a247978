//! Headless Relay server binary
//!
//! Wires the relay for a small demo site: articles, a news section, a
//! topic page aggregating two sources, a static about page and a cache
//! invalidation endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use headless_relay::cache::{CacheBackend, MemoryBackend, RedisBackend};
use headless_relay::config::{CacheBackendKind, LogFormat};
use headless_relay::render::SiteTemplates;
use headless_relay::upstream::HttpFetcher;
use headless_relay::{spawn_cleanup_task, AppState, Config, ContentRouter, Pipeline, RouteOptions};

/// Main entry point for the relay.
///
/// # Startup Sequence
/// 1. Load configuration from environment variables
/// 2. Initialize tracing in the configured format
/// 3. Connect the cache backend (and start the sweep for the memory store)
/// 4. Register routes and build the router
/// 5. Serve until SIGINT/SIGTERM, then close the cache backend
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_format);

    info!("Starting Headless Relay");
    info!(
        port = config.port,
        api_base = %config.api_base,
        backend = ?config.cache_backend,
        cache_ttl = config.cache_ttl,
        "Configuration loaded"
    );

    let (cache, cleanup_handle) = connect_cache(&config).await?;

    let fetcher = HttpFetcher::new(&config.api_base, config.upstream_timeout())
        .context("failed to build upstream client")?;
    let pipeline = Pipeline::new(
        Arc::clone(&cache),
        Arc::new(fetcher),
        Arc::new(SiteTemplates::new()),
        &config.api_base,
        config.cache_ttl(),
    );
    let state = AppState::new(
        pipeline,
        &config.error_template,
        std::time::Duration::from_secs(config.freshness_secs),
    );

    let app = ContentRouter::new(state)
        .with_static_dir(&config.static_dir)
        .route_item("/articles/:id", "item.html", RouteOptions::item("node/{id}"))?
        .route_section("/news", "list.html", RouteOptions::list("views/news"))?
        .route_multi(
            "/topics/:topic",
            "multi.html",
            RouteOptions::multi([("latest", "taxonomy/{topic}"), ("menu", "menu/main")]),
        )?
        .route_static("/about", "static.html", RouteOptions::static_resource("about"))?
        .route_cache("/articles/:id")?
        .route_cache("/news")?
        .route_cache("/_cache/*key")?
        .into_router();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    cache.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Defaults to `headless_relay=info,tower_http=info`; `RUST_LOG` overrides.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "headless_relay=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
        LogFormat::Compact => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

async fn connect_cache(
    config: &Config,
) -> anyhow::Result<(Arc<dyn CacheBackend>, Option<JoinHandle<()>>)> {
    match config.cache_backend {
        CacheBackendKind::Memory => {
            let backend = MemoryBackend::new(config.max_entries);
            let handle = spawn_cleanup_task(backend.store(), config.cleanup_interval);
            info!(max_entries = config.max_entries, "In-memory cache store initialized");
            let backend: Arc<dyn CacheBackend> = Arc::new(backend);
            Ok((backend, Some(handle)))
        }
        CacheBackendKind::Redis => {
            let backend = RedisBackend::connect(&config.redis)
                .await
                .context("failed to connect to Redis")?;
            let backend: Arc<dyn CacheBackend> = Arc::new(backend);
            Ok((backend, None))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cache expiry sweep aborted");
    }
}
