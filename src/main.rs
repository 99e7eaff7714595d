//! Blueprint - a service scaffold
//!
//! Binary entry point: logging, wiring, listener and graceful shutdown.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blueprint::cache::{CacheStore, KvBackend, MemoryBackend, RedisBackend};
use blueprint::service::{BlueprintHandler, PersistentStore, SqliteStore};
use blueprint::{create_router, spawn_cleanup_task, AppState, Config, RateLimiter};

/// Main entry point for the blueprint service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache backend (Redis or in-memory), cache store, rate limiter
///    and optional SQLite store
/// 4. Start background cleanup task
/// 5. Serve the router on the configured address
/// 6. On SIGINT/SIGTERM, drain in-flight requests for at most the shutdown timeout
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blueprint=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting blueprint service");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        service = %config.service_name,
        address = %config.bind_address(),
        rate_limit = config.rate_limit_requests,
        rate_window_secs = config.rate_limit_window.as_secs(),
        cache_max_entries = config.cache_max_entries,
        redis = config.redis_url.is_some(),
        "Configuration loaded"
    );

    // Redis when configured; otherwise the in-process backend, which the
    // cleanup task has to sweep
    let (backend, memory): (Arc<dyn KvBackend>, Option<Arc<MemoryBackend>>) =
        match &config.redis_url {
            Some(url) => {
                let redis = RedisBackend::connect(url)
                    .await
                    .context("Failed to connect to Redis")?;
                info!("Redis cache backend connected");
                (Arc::new(redis), None)
            }
            None => {
                let memory = Arc::new(MemoryBackend::new(config.cache_max_entries));
                info!(max_entries = config.cache_max_entries, "In-memory cache backend");
                (memory.clone(), Some(memory))
            }
        };
    let cache = Arc::new(CacheStore::with_options(backend, config.cache_options()));
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_requests,
        config.rate_limit_window,
    ));

    let mut builder = BlueprintHandler::builder(config.handler_config(), cache, limiter.clone());
    if let Some(path) = &config.database_path {
        let store = SqliteStore::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        store.ping().await.context("Database ping failed")?;
        info!(path = %path.display(), "Persistent store connected");
        builder = builder.store(Arc::new(store));
    }
    let handler = Arc::new(builder.build());

    let cleanup_handle = spawn_cleanup_task(memory, limiter, config.cleanup_interval);
    info!("Background cleanup task started");

    let app = create_router(AppState::new(handler));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server listening on http://{}", address);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            cleanup_handle.abort();
            return result
                .context("Server task failed")?
                .context("Server error");
        }
        _ = shutdown_signal() => {}
    }

    let _ = shutdown_tx.send(());
    cleanup_handle.abort();
    warn!("Cleanup task aborted");

    match tokio::time::timeout(config.shutdown_timeout, &mut server).await {
        Ok(Ok(Ok(()))) => info!("Server shutdown complete"),
        Ok(Ok(Err(e))) => error!(error = %e, "Server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "Server task failed during shutdown"),
        Err(_) => {
            warn!(
                timeout_secs = config.shutdown_timeout.as_secs(),
                "Shutdown timed out, aborting in-flight requests"
            );
            server.abort();
        }
    }

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
}
