//! In-process aggregate cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::service::{AggregateCache, CacheError, CacheResult};
use crate::domain::analytics::{AdStats, FIELD_CLICKS};
use crate::domain::cache_key::{AggregateKey, KeyTag};

type Records = BTreeMap<String, HashMap<String, String>>;

/// A cache that keeps its records in process memory.
///
/// Behaves like the Redis implementation, including atomic increments.
/// Used by integration tests and local tooling. [`MemoryCache::set_available`]
/// simulates an unreachable backend.
#[derive(Default)]
pub struct MemoryCache {
    records: Mutex<Records>,
    unavailable: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        debug!("Using in-memory aggregate cache");
        Self::default()
    }

    /// Makes every subsequent operation fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Writes a raw field, bypassing all typing.
    pub fn put_raw(&self, key: AggregateKey, field: &str, value: &str) {
        self.with_records(|records| {
            records
                .entry(key.to_string())
                .or_default()
                .insert(field.to_string(), value.to_string());
        });
    }

    /// Removes every record.
    pub fn clear(&self) {
        self.with_records(|records| records.clear());
    }

    /// Sorted copy of every record, for comparisons in tests.
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.with_records(|records| {
            records
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().map(|(f, x)| (f.clone(), x.clone())).collect()))
                .collect()
        })
    }

    fn check(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionError("in-memory cache disabled".to_string()));
        }
        Ok(())
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut Records) -> T) -> T {
        let mut guard = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn write_stats(records: &mut Records, ad_id: i64, stats: &AdStats) {
        let record = records
            .entry(AggregateKey::stats(ad_id).to_string())
            .or_default();
        for (field, value) in stats.to_fields() {
            record.insert(field.to_string(), value);
        }
    }
}

#[async_trait]
impl AggregateCache for MemoryCache {
    async fn record_click(&self, ad_id: i64, stats: &AdStats) -> CacheResult<i64> {
        self.check()?;
        self.with_records(|records| {
            let counter = records
                .entry(AggregateKey::counter(ad_id).to_string())
                .or_default();
            let current = match counter.get(FIELD_CLICKS) {
                Some(raw) => raw.parse::<i64>().map_err(|_| {
                    CacheError::OperationError("hash value is not an integer".to_string())
                })?,
                None => 0,
            };
            let next = current + 1;
            counter.insert(FIELD_CLICKS.to_string(), next.to_string());

            Self::write_stats(records, ad_id, stats);
            Ok(next)
        })
    }

    async fn write_aggregate(&self, ad_id: i64, clicks: i64, stats: &AdStats) -> CacheResult<()> {
        self.check()?;
        self.with_records(|records| {
            records
                .entry(AggregateKey::counter(ad_id).to_string())
                .or_default()
                .insert(FIELD_CLICKS.to_string(), clicks.to_string());
            Self::write_stats(records, ad_id, stats);
        });
        Ok(())
    }

    async fn read_record(&self, key: AggregateKey) -> CacheResult<HashMap<String, String>> {
        self.check()?;
        Ok(self.with_records(|records| records.get(&key.to_string()).cloned().unwrap_or_default()))
    }

    async fn scan_keys(&self, tag: KeyTag) -> CacheResult<Vec<AggregateKey>> {
        self.check()?;
        let mut keys: Vec<AggregateKey> = self.with_records(|records| {
            records
                .keys()
                .filter_map(|raw| raw.parse::<AggregateKey>().ok())
                .filter(|key| key.tag == tag)
                .collect()
        });
        keys.sort_by_key(|k| k.ad_id);
        Ok(keys)
    }

    async fn health_check(&self) -> bool {
        self.check().is_ok()
    }
}
