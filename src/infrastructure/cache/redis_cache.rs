//! Redis-backed aggregate cache.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisResult, aio::ConnectionManager};
use tracing::{debug, info, warn};

use super::service::{AggregateCache, CacheError, CacheResult};
use crate::domain::analytics::{AdStats, FIELD_CLICKS};
use crate::domain::cache_key::{AggregateKey, KeyTag};

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH: usize = 100;

/// Redis implementation of [`AggregateCache`].
///
/// Uses a shared `ConnectionManager` (multiplexed, reconnecting). Every
/// command is bounded by `timeout`; exceeding it yields
/// [`CacheError::Timeout`].
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ConnectionError`] if the URL is invalid, the connection cannot
    /// be established, or the PING health check fails.
    pub async fn connect(redis_url: &str, timeout: Duration) -> CacheResult<Self> {
        info!("Connecting to aggregate cache");

        let client = Client::open(redis_url).map_err(|e| {
            CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to aggregate cache");

        Ok(Self {
            conn: manager,
            timeout,
        })
    }

    async fn run<T, F>(&self, op: &'static str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::OperationError(format!("{op}: {e}"))),
            Err(_) => Err(CacheError::Timeout(op)),
        }
    }
}

#[async_trait]
impl AggregateCache for RedisCache {
    async fn record_click(&self, ad_id: i64, stats: &AdStats) -> CacheResult<i64> {
        let counter_key = AggregateKey::counter(ad_id).to_string();
        let stats_key = AggregateKey::stats(ad_id).to_string();
        let fields = stats.to_fields();
        let mut conn = self.conn.clone();

        let (clicks,): (i64,) = self
            .run("HINCRBY+HSET", async move {
                redis::pipe()
                    .atomic()
                    .hincr(&counter_key, FIELD_CLICKS, 1)
                    .hset_multiple(&stats_key, &fields)
                    .ignore()
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        debug!(ad_id, clicks, "Cache counter incremented");
        Ok(clicks)
    }

    async fn write_aggregate(&self, ad_id: i64, clicks: i64, stats: &AdStats) -> CacheResult<()> {
        let counter_key = AggregateKey::counter(ad_id).to_string();
        let stats_key = AggregateKey::stats(ad_id).to_string();
        let fields = stats.to_fields();
        let mut conn = self.conn.clone();

        self.run("HSET", async move {
            redis::pipe()
                .atomic()
                .hset(&counter_key, FIELD_CLICKS, clicks)
                .ignore()
                .hset_multiple(&stats_key, &fields)
                .ignore()
                .query_async::<()>(&mut conn)
                .await
        })
        .await
    }

    async fn read_record(&self, key: AggregateKey) -> CacheResult<HashMap<String, String>> {
        let raw_key = key.to_string();
        let mut conn = self.conn.clone();

        self.run("HGETALL", async move {
            conn.hgetall::<_, HashMap<String, String>>(&raw_key).await
        })
        .await
    }

    async fn scan_keys(&self, tag: KeyTag) -> CacheResult<Vec<AggregateKey>> {
        let pattern = tag.scan_pattern();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let mut conn = self.conn.clone();
            let pattern = pattern.clone();
            let (next, batch): (u64, Vec<String>) = self
                .run("SCAN", async move {
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn)
                        .await
                })
                .await?;

            for raw in batch {
                match raw.parse::<AggregateKey>() {
                    Ok(key) if key.tag == tag => keys.push(key),
                    _ => warn!(key = %raw, "Skipping key that is not an ad aggregate"),
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        keys.sort_by_key(|k| k.ad_id);
        keys.dedup();
        Ok(keys)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        self.run("PING", async move { conn.ping::<()>().await })
            .await
            .is_ok()
    }
}
