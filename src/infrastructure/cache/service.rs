//! Aggregate cache trait and error types.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::analytics::AdStats;
use crate::domain::cache_key::{AggregateKey, KeyTag};

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    ConnectionError(String),
    #[error("Cache operation error: {0}")]
    OperationError(String),
    #[error("Cache operation {0} timed out")]
    Timeout(&'static str),
    #[error("Malformed field '{field}' in {key}")]
    Malformed { key: String, field: &'static str },
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Low-latency store of per-ad aggregates.
///
/// Counter records are only ever changed through atomic increments or
/// whole-field overwrites; implementations never read-modify-write.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis hashes
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process map for tests and tooling
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AggregateCache: Send + Sync {
    /// Increments the counter record by one and overwrites the stats record,
    /// as a single atomic unit.
    ///
    /// # Returns
    ///
    /// The counter value after the increment.
    async fn record_click(&self, ad_id: i64, stats: &AdStats) -> CacheResult<i64>;

    /// Overwrites both records of an ad (used by rebuilds).
    async fn write_aggregate(&self, ad_id: i64, clicks: i64, stats: &AdStats) -> CacheResult<()>;

    /// Reads every field of one record.
    ///
    /// # Returns
    ///
    /// An empty map when the record does not exist.
    async fn read_record(&self, key: AggregateKey) -> CacheResult<HashMap<String, String>>;

    /// Enumerates every key carrying `tag`, ordered by ad id.
    ///
    /// Keys that match the pattern but do not parse are skipped.
    async fn scan_keys(&self, tag: KeyTag) -> CacheResult<Vec<AggregateKey>>;

    /// Checks if the cache backend is healthy.
    async fn health_check(&self) -> bool;
}
