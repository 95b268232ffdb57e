#![allow(dead_code)]

use ad_click_pipeline::api;
use ad_click_pipeline::api::handlers::health_handler;
use ad_click_pipeline::domain::click_worker::{ClickWorker, ClickWorkerSettings};
use ad_click_pipeline::domain::entities::{ClickRow, FlushPolicy};
use ad_click_pipeline::domain::flush_scheduler::FlushScheduler;
use ad_click_pipeline::domain::sync_state::SyncTracker;
use ad_click_pipeline::infrastructure::broker::MemoryBroker;
use ad_click_pipeline::infrastructure::cache::MemoryCache;
use ad_click_pipeline::infrastructure::persistence::MemoryStore;
use ad_click_pipeline::state::{AppState, Backends, Deadlines};
use axum::{Router, routing::get};
use axum_test::TestServer;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

/// In-memory backends plus the state built on top of them.
pub struct TestContext {
    pub cache: Arc<MemoryCache>,
    pub broker: Arc<MemoryBroker>,
    pub store: Arc<MemoryStore>,
    pub tracker: Arc<SyncTracker>,
    pub state: AppState,
}

pub fn create_test_context() -> TestContext {
    let cache = Arc::new(MemoryCache::new());
    let broker = Arc::new(MemoryBroker::new());
    let store = Arc::new(MemoryStore::new());
    let tracker = Arc::new(SyncTracker::new());

    let backends = Backends {
        cache: cache.clone(),
        publisher: broker.clone(),
        ads: store.clone(),
        stats: store.clone(),
    };

    let state = AppState::new(
        &backends,
        tracker.clone(),
        Deadlines {
            publish: Duration::from_millis(500),
            cache_read: Duration::from_millis(500),
        },
    );

    TestContext {
        cache,
        broker,
        store,
        tracker,
        state,
    }
}

/// Every route, without rate limiting or path normalization.
pub fn make_server(ctx: &TestContext) -> TestServer {
    let app = Router::new()
        .merge(api::routes::ad_routes())
        .merge(api::routes::click_routes())
        .route("/health", get(health_handler))
        .with_state(ctx.state.clone());
    TestServer::new(app).unwrap()
}

pub fn click_worker(ctx: &TestContext) -> ClickWorker {
    ClickWorker::new(
        ctx.broker.clone(),
        ctx.store.clone(),
        ctx.store.clone(),
        ClickWorkerSettings {
            concurrency: 4,
            batch_size: 10,
            idle: Duration::from_millis(5),
            claim_idle: Duration::ZERO,
        },
    )
}

pub fn flush_scheduler(ctx: &TestContext, policy: FlushPolicy) -> FlushScheduler {
    FlushScheduler::new(
        ctx.cache.clone(),
        ctx.store.clone(),
        ctx.tracker.clone(),
        policy,
        Duration::from_secs(5),
    )
}

/// Drains the broker until a poll returns nothing.
pub async fn drain_all(worker: &ClickWorker) -> usize {
    let mut persisted = 0;
    loop {
        let report = worker.drain_once().await.unwrap();
        if report.received == 0 {
            return persisted;
        }
        persisted += report.persisted;
    }
}

pub fn click_body(ad_id: i64) -> Value {
    json!({
        "id": ad_id,
        "ip": "1.2.3.4",
        "playback_time": 50,
        "timeframe": 25
    })
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_735_689_600 + secs, 0).unwrap()
}

pub fn click_row(ad_id: i64, secs: i64, playback_time: f64, timeframe: f64) -> ClickRow {
    ClickRow {
        ad_id,
        ip: "10.0.0.1".to_string(),
        timestamp: at(secs),
        timeframe,
        playback_time,
    }
}

/// Reads one field of a cache record, if present.
pub fn cache_field(cache: &MemoryCache, key: &str, field: &str) -> Option<String> {
    cache
        .snapshot()
        .get(key)
        .and_then(|record| record.get(field).cloned())
}

/// Polls until `field` of `key` equals `expected`; the click handler updates
/// the cache in the background.
pub async fn wait_for_cache(cache: &MemoryCache, key: &str, field: &str, expected: &str) {
    for _ in 0..100 {
        if cache_field(cache, key, field).as_deref() == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "{key}.{field} never became {expected}, last value {:?}",
        cache_field(cache, key, field)
    );
}
