//! In-process durable store.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::domain::analytics::RebuildRow;
use crate::domain::entities::{AdRecord, ClickRow, FlushPolicy, ReconcileOutcome};
use crate::domain::repositories::{AdRepository, StatsRepository};
use crate::error::AppError;

#[derive(Default)]
struct Tables {
    ads: BTreeMap<i64, AdRecord>,
    clicks: Vec<ClickRow>,
}

/// Implements both repositories over in-memory tables.
///
/// A single mutex stands in for the per-ad transactional scope of the
/// PostgreSQL implementation. Failure switches simulate an unreachable
/// store or a failing counter update.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    fail_increments: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_ad(&self, id: i64, image_url: &str, target_url: &str, clicks: i64) {
        self.with_tables(|t| {
            t.ads.insert(
                id,
                AdRecord {
                    id,
                    image_url: image_url.to_string(),
                    target_url: target_url.to_string(),
                    clicks,
                },
            );
        });
    }

    /// Appends a click row directly, bypassing the worker.
    pub fn insert_click(&self, row: ClickRow) {
        self.with_tables(|t| t.clicks.push(row));
    }

    pub fn clicks_for(&self, ad_id: i64) -> Vec<ClickRow> {
        self.with_tables(|t| t.clicks.iter().filter(|r| r.ad_id == ad_id).cloned().collect())
    }

    pub fn ad(&self, ad_id: i64) -> Option<AdRecord> {
        self.with_tables(|t| t.ads.get(&ad_id).cloned())
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Makes counter increments fail while row inserts keep working.
    pub fn set_fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::unavailable("Database unavailable", json!({})));
        }
        Ok(())
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut guard = self
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl AdRepository for MemoryStore {
    async fn list_ads(&self) -> Result<Vec<AdRecord>, AppError> {
        self.check()?;
        Ok(self.with_tables(|t| t.ads.values().cloned().collect()))
    }

    async fn find_ad(&self, ad_id: i64) -> Result<Option<AdRecord>, AppError> {
        self.check()?;
        Ok(self.ad(ad_id))
    }

    async fn increment_clicks(&self, ad_id: i64) -> Result<bool, AppError> {
        self.check()?;
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(AppError::internal("Counter update failed", json!({ "ad_id": ad_id })));
        }
        Ok(self.with_tables(|t| match t.ads.get_mut(&ad_id) {
            Some(ad) => {
                ad.clicks += 1;
                true
            }
            None => false,
        }))
    }

    async fn reconcile_clicks(
        &self,
        ad_id: i64,
        cache_clicks: i64,
        policy: FlushPolicy,
    ) -> Result<ReconcileOutcome, AppError> {
        self.check()?;
        Ok(self.with_tables(|t| {
            let previous = t.ads.get(&ad_id).map(|ad| ad.clicks);
            let outcome = ReconcileOutcome::resolve(previous, cache_clicks, policy);
            t.ads
                .entry(ad_id)
                .or_insert_with(|| AdRecord {
                    id: ad_id,
                    image_url: String::new(),
                    target_url: String::new(),
                    clicks: 0,
                })
                .clicks = outcome.written;
            outcome
        }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check()
    }
}

#[async_trait]
impl StatsRepository for MemoryStore {
    async fn record_click(&self, row: &ClickRow) -> Result<(), AppError> {
        self.check()?;
        self.insert_click(row.clone());
        Ok(())
    }

    async fn rebuild_rows(&self, ad_id: Option<i64>) -> Result<Vec<RebuildRow>, AppError> {
        self.check()?;
        Ok(self.with_tables(|t| {
            // Later rows win ties on timestamp, like `row_id DESC` in SQL.
            let mut latest: BTreeMap<i64, (i64, &ClickRow)> = BTreeMap::new();
            for row in &t.clicks {
                if ad_id.is_some_and(|id| id != row.ad_id) || !t.ads.contains_key(&row.ad_id) {
                    continue;
                }
                let entry = latest.entry(row.ad_id).or_insert((0, row));
                entry.0 += 1;
                if row.timestamp >= entry.1.timestamp {
                    entry.1 = row;
                }
            }

            latest
                .into_iter()
                .map(|(id, (clicks, row))| RebuildRow {
                    ad_id: id,
                    clicks,
                    playback_time: row.playback_time,
                    timeframe: row.timeframe,
                })
                .collect()
        }))
    }
}
