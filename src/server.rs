//! Service initialization and runtime setup.
//!
//! Connects the durable store, the aggregate cache and the event broker,
//! spawns the click worker and flush scheduler, and serves HTTP until a
//! shutdown signal arrives.

use crate::config::Config;
use crate::domain::click_worker::ClickWorker;
use crate::domain::flush_scheduler::FlushScheduler;
use crate::domain::sync_state::SyncTracker;
use crate::infrastructure::broker::RedisStreamBroker;
use crate::infrastructure::cache::RedisCache;
use crate::infrastructure::persistence::{PgAdRepository, PgStatsRepository};
use crate::routes::{RateLimit, app_router};
use crate::shutdown::ShutdownSignal;
use crate::state::{AppState, Backends, Deadlines};

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Opens the PostgreSQL pool with the configured limits.
///
/// # Errors
///
/// Returns an error if the database cannot be reached.
pub async fn connect_database(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");
    Ok(pool)
}

/// Connects every external backend. Any failure is fatal.
///
/// # Errors
///
/// Returns an error if the store, cache or broker cannot be reached, or if
/// migrations fail.
pub async fn connect_backends(config: &Config) -> Result<(PgPool, Backends)> {
    let pool = connect_database(config).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let cache = RedisCache::connect(&config.redis_url, config.cache_timeout())
        .await
        .context("Aggregate cache unavailable")?;

    let broker = RedisStreamBroker::connect(
        &config.broker_url,
        config.stream_settings(),
        config.publish_timeout(),
    )
    .await
    .context("Event broker unavailable")?;

    let pool_arc = Arc::new(pool.clone());
    let backends = Backends {
        cache: Arc::new(cache),
        publisher: Arc::new(broker),
        ads: Arc::new(PgAdRepository::new(pool_arc.clone(), config.store_timeout())),
        stats: Arc::new(PgStatsRepository::new(pool_arc, config.store_timeout())),
    };

    Ok((pool, backends))
}

/// Runs the service with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool and migrations
/// - Redis aggregate cache
/// - Redis Streams broker (publisher and consumer group)
/// - Background click worker and flush scheduler
/// - Axum HTTP server
///
/// # Errors
///
/// Returns an error if any backend is unreachable at startup, or if the
/// server cannot bind or fails while running.
pub async fn run(config: Config) -> Result<()> {
    let (pool, backends) = connect_backends(&config).await?;

    let subscriber = Arc::new(
        RedisStreamBroker::connect(
            &config.broker_url,
            config.stream_settings(),
            config.publish_timeout(),
        )
        .await
        .context("Event broker unavailable")?,
    );

    let tracker = Arc::new(SyncTracker::new());
    let shutdown = ShutdownSignal::new();

    let worker = ClickWorker::new(
        subscriber,
        backends.stats.clone(),
        backends.ads.clone(),
        config.click_worker_settings(),
    );
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let scheduler = Arc::new(FlushScheduler::new(
        backends.cache.clone(),
        backends.ads.clone(),
        tracker.clone(),
        config.flush_policy,
        config.flush_tick_timeout(),
    ));
    let flush_handle = tokio::spawn(scheduler.run(config.flush_interval(), shutdown.clone()));

    let state = AppState::new(
        &backends,
        tracker,
        Deadlines {
            publish: config.publish_timeout(),
            cache_read: config.cache_timeout(),
        },
    );
    let app = app_router(state, RateLimit::for_deployment(config.behind_proxy));

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    let signal_listener = shutdown.clone();
    tokio::spawn(async move { signal_listener.listen_for_os_signals().await });

    let server_shutdown = shutdown.clone();
    let served = axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(async move { server_shutdown.recv().await })
    .await;

    // Also reached when the server fails; the loops must stop either way.
    shutdown.trigger();
    for (name, handle) in [("click worker", worker_handle), ("flush scheduler", flush_handle)] {
        if let Err(e) = handle.await {
            tracing::error!(task = name, error = %e, "Background task ended abnormally");
        }
    }

    pool.close().await;
    served?;
    tracing::info!("Shutdown complete");

    Ok(())
}
