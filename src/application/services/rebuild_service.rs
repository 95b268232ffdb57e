//! Cache rebuild from the durable store.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::repositories::StatsRepository;
use crate::domain::sync_state::SyncTracker;
use crate::error::AppError;
use crate::infrastructure::cache::AggregateCache;

/// What a rebuild run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Rows returned by the store query.
    pub rows: usize,
    /// Ads whose cache records were overwritten.
    pub written: usize,
    /// Ads whose cache write failed.
    pub failed: usize,
    /// True if this call waited on a rebuild already in progress instead of
    /// running its own.
    pub coalesced: bool,
}

/// Recomputes the per-ad cache records from `ads_clicks` + `metadata_ads`.
///
/// Completion does not imply fresh data: a failed store query still
/// completes, and individual cache writes may fail without stopping the run.
pub struct RebuildService {
    stats: Arc<dyn StatsRepository>,
    cache: Arc<dyn AggregateCache>,
    tracker: Arc<SyncTracker>,
    in_flight: Mutex<()>,
}

impl RebuildService {
    pub fn new(
        stats: Arc<dyn StatsRepository>,
        cache: Arc<dyn AggregateCache>,
        tracker: Arc<SyncTracker>,
    ) -> Self {
        Self {
            stats,
            cache,
            tracker,
            in_flight: Mutex::new(()),
        }
    }

    /// Rebuilds every ad, joining a full rebuild that is already running.
    ///
    /// # Errors
    ///
    /// Returns the store error if the rebuild query failed.
    pub async fn rebuild_all(&self) -> Result<RebuildReport, AppError> {
        match self.in_flight.try_lock() {
            Ok(_guard) => self.run(None).await,
            Err(_) => {
                tracing::debug!("rebuild already in progress, waiting for it");
                let _guard = self.in_flight.lock().await;
                Ok(RebuildReport {
                    coalesced: true,
                    ..RebuildReport::default()
                })
            }
        }
    }

    /// Rebuilds a single ad.
    ///
    /// # Errors
    ///
    /// Returns the store error if the rebuild query failed.
    pub async fn rebuild_ad(&self, ad_id: i64) -> Result<RebuildReport, AppError> {
        self.run(Some(ad_id)).await
    }

    async fn run(&self, ad_id: Option<i64>) -> Result<RebuildReport, AppError> {
        let rows = match self.stats.rebuild_rows(ad_id).await {
            Ok(rows) => rows,
            Err(e) => {
                counter!("rebuild_runs_total", "outcome" => "error").increment(1);
                tracing::error!(ad_id = ?ad_id, error = %e, "rebuild query failed");
                return Err(e);
            }
        };

        let mut report = RebuildReport {
            rows: rows.len(),
            ..RebuildReport::default()
        };

        for row in &rows {
            match self
                .cache
                .write_aggregate(row.ad_id, row.clicks, &row.stats())
                .await
            {
                Ok(()) => {
                    self.tracker.mark_reconciled(row.ad_id);
                    report.written += 1;
                }
                Err(e) => {
                    tracing::warn!(ad_id = row.ad_id, error = %e, "failed to write rebuilt aggregate");
                    report.failed += 1;
                }
            }
        }

        counter!("rebuild_runs_total", "outcome" => "ok").increment(1);
        tracing::info!(
            scope = ?ad_id,
            rows = report.rows,
            written = report.written,
            failed = report.failed,
            "cache rebuild finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::RebuildRow;
    use crate::domain::repositories::MockStatsRepository;
    use crate::infrastructure::cache::MemoryCache;
    use serde_json::json;

    fn row(ad_id: i64, clicks: i64) -> RebuildRow {
        RebuildRow {
            ad_id,
            clicks,
            playback_time: 30.0,
            timeframe: 10.0,
        }
    }

    #[tokio::test]
    async fn test_rebuild_overwrites_both_records() {
        let mut stats = MockStatsRepository::new();
        stats
            .expect_rebuild_rows()
            .withf(|ad_id| ad_id.is_none())
            .returning(|_| Ok(vec![row(1, 3), row(2, 8)]));

        let cache = Arc::new(MemoryCache::new());
        let tracker = Arc::new(SyncTracker::new());
        let service = RebuildService::new(Arc::new(stats), cache.clone(), tracker.clone());

        let report = service.rebuild_all().await.unwrap();

        assert_eq!(report.written, 2);
        let snapshot = cache.snapshot();
        assert_eq!(snapshot["ad-2"]["clicks"], "8");
        assert_eq!(snapshot["time-1"]["impression"], "3");
        assert_eq!(tracker.summary().reconciled, 2);
    }

    #[tokio::test]
    async fn test_rebuild_is_deterministic() {
        let mut stats = MockStatsRepository::new();
        stats
            .expect_rebuild_rows()
            .times(2)
            .returning(|_| Ok(vec![row(5, 4)]));

        let cache = Arc::new(MemoryCache::new());
        let service = RebuildService::new(
            Arc::new(stats),
            cache.clone(),
            Arc::new(SyncTracker::new()),
        );

        service.rebuild_all().await.unwrap();
        let first = cache.snapshot();
        service.rebuild_all().await.unwrap();

        assert_eq!(cache.snapshot(), first);
    }

    #[tokio::test]
    async fn test_query_failure_completes_without_writing() {
        let mut stats = MockStatsRepository::new();
        stats
            .expect_rebuild_rows()
            .returning(|_| Err(AppError::unavailable("Database unavailable", json!({}))));

        let cache = Arc::new(MemoryCache::new());
        let service = RebuildService::new(
            Arc::new(stats),
            cache.clone(),
            Arc::new(SyncTracker::new()),
        );

        assert!(service.rebuild_all().await.is_err());
        assert!(cache.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_single_ad_rebuild_passes_filter() {
        let mut stats = MockStatsRepository::new();
        stats
            .expect_rebuild_rows()
            .withf(|ad_id| *ad_id == Some(9))
            .times(1)
            .returning(|_| Ok(vec![row(9, 1)]));

        let service = RebuildService::new(
            Arc::new(stats),
            Arc::new(MemoryCache::new()),
            Arc::new(SyncTracker::new()),
        );

        assert_eq!(service.rebuild_ad(9).await.unwrap().written, 1);
    }
}
