//! Analytics reads from the aggregate cache.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::application::services::RebuildService;
use crate::domain::analytics::{AdAnalytics, AdStats, compute_ctr, parse_clicks};
use crate::domain::cache_key::AggregateKey;
use crate::error::AppError;
use crate::infrastructure::cache::AggregateCache;
use crate::utils::deadline::with_deadline;

/// Service behind `GET /ads/analytics/{id}`.
pub struct AnalyticsService {
    cache: Arc<dyn AggregateCache>,
    rebuild: Arc<RebuildService>,
    read_timeout: Duration,
}

impl AnalyticsService {
    pub fn new(
        cache: Arc<dyn AggregateCache>,
        rebuild: Arc<RebuildService>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            rebuild,
            read_timeout,
        }
    }

    /// Reads clicks, impression and CTR for one ad.
    ///
    /// If either cache record is missing, a full rebuild runs to completion
    /// and the call still answers "not found": the caller is expected to
    /// retry and read the rebuilt value.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] on a cache miss, or when the impression is
    ///   zero and no CTR can be computed
    /// - [`AppError::Timeout`] if the cache read exceeds its deadline
    /// - [`AppError::Internal`] if a stored value is not a number
    pub async fn get_analytics(&self, ad_id: i64) -> Result<AdAnalytics, AppError> {
        let (counter, stats) = tokio::try_join!(
            with_deadline(
                self.read_timeout,
                "read_counter",
                self.cache.read_record(AggregateKey::counter(ad_id)),
            ),
            with_deadline(
                self.read_timeout,
                "read_stats",
                self.cache.read_record(AggregateKey::stats(ad_id)),
            ),
        )?;

        if counter.is_empty() || stats.is_empty() {
            tracing::info!(ad_id, "aggregate cache miss, rebuilding");
            if let Err(e) = self.rebuild.rebuild_all().await {
                tracing::warn!(ad_id, error = %e, "rebuild after cache miss failed");
            }
            return Err(AppError::not_found(
                "Analytics not available yet, retry shortly",
                json!({ "ad_id": ad_id }),
            ));
        }

        let clicks = parse_clicks(ad_id, &counter)?;
        let stats = AdStats::from_fields(ad_id, &stats)?;

        let ctr = compute_ctr(clicks, stats.impression).ok_or_else(|| {
            AppError::not_found(
                "Analytics unavailable for zero impression",
                json!({ "ad_id": ad_id, "impression": stats.impression }),
            )
        })?;

        Ok(AdAnalytics {
            ad_id,
            clicks,
            impression: stats.impression,
            ctr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::RebuildRow;
    use crate::domain::repositories::MockStatsRepository;
    use crate::domain::sync_state::SyncTracker;
    use crate::domain::cache_key::KeyTag;
    use crate::infrastructure::cache::{CacheResult, MemoryCache};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::collections::HashMap;

    /// Cache whose reads never complete.
    struct StalledCache;

    #[async_trait]
    impl AggregateCache for StalledCache {
        async fn record_click(&self, _: i64, _: &AdStats) -> CacheResult<i64> {
            std::future::pending().await
        }

        async fn write_aggregate(&self, _: i64, _: i64, _: &AdStats) -> CacheResult<()> {
            std::future::pending().await
        }

        async fn read_record(&self, _: AggregateKey) -> CacheResult<HashMap<String, String>> {
            std::future::pending().await
        }

        async fn scan_keys(&self, _: KeyTag) -> CacheResult<Vec<AggregateKey>> {
            std::future::pending().await
        }

        async fn health_check(&self) -> bool {
            false
        }
    }

    fn build(stats: MockStatsRepository, cache: Arc<MemoryCache>) -> AnalyticsService {
        let tracker = Arc::new(SyncTracker::new());
        let rebuild = Arc::new(RebuildService::new(Arc::new(stats), cache.clone(), tracker));
        AnalyticsService::new(cache, rebuild, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_hit_computes_ctr() {
        let cache = Arc::new(MemoryCache::new());
        cache.put_raw(AggregateKey::counter(3), "clicks", "5");
        cache.put_raw(AggregateKey::stats(3), "impression", "2");
        cache.put_raw(AggregateKey::stats(3), "timeframe", "25");
        cache.put_raw(AggregateKey::stats(3), "playbacktime", "50");

        let mut stats = MockStatsRepository::new();
        stats.expect_rebuild_rows().never();

        let analytics = build(stats, cache).get_analytics(3).await.unwrap();

        assert_eq!(analytics.clicks, 5);
        assert_eq!(analytics.ctr, 250);
    }

    #[tokio::test]
    async fn test_miss_rebuilds_then_reports_not_found() {
        let cache = Arc::new(MemoryCache::new());
        let mut stats = MockStatsRepository::new();
        stats.expect_rebuild_rows().times(1).returning(|_| {
            Ok(vec![RebuildRow {
                ad_id: 3,
                clicks: 2,
                playback_time: 10.0,
                timeframe: 5.0,
            }])
        });

        let service = build(stats, cache.clone());

        assert!(matches!(
            service.get_analytics(3).await,
            Err(AppError::NotFound { .. })
        ));
        // The retry is served from the rebuilt records.
        let analytics = service.get_analytics(3).await.unwrap();
        assert_eq!(analytics.ctr, 100);
    }

    #[tokio::test]
    async fn test_partial_record_is_a_miss() {
        let cache = Arc::new(MemoryCache::new());
        cache.put_raw(AggregateKey::counter(4), "clicks", "1");

        let mut stats = MockStatsRepository::new();
        stats.expect_rebuild_rows().times(1).returning(|_| Ok(vec![]));

        let result = build(stats, cache).get_analytics(4).await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_malformed_value_is_hard_failure() {
        let cache = Arc::new(MemoryCache::new());
        cache.put_raw(AggregateKey::counter(6), "clicks", "lots");
        cache.put_raw(AggregateKey::stats(6), "impression", "2");
        cache.put_raw(AggregateKey::stats(6), "timeframe", "1");
        cache.put_raw(AggregateKey::stats(6), "playbacktime", "2");

        let result = build(MockStatsRepository::new(), cache).get_analytics(6).await;
        assert!(matches!(result, Err(AppError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_zero_impression_is_unavailable() {
        let cache = Arc::new(MemoryCache::new());
        cache.put_raw(AggregateKey::counter(8), "clicks", "3");
        cache.put_raw(AggregateKey::stats(8), "impression", "0");
        cache.put_raw(AggregateKey::stats(8), "timeframe", "1");
        cache.put_raw(AggregateKey::stats(8), "playbacktime", "0");

        let result = build(MockStatsRepository::new(), cache).get_analytics(8).await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_cache_read_times_out() {
        let mut stats = MockStatsRepository::new();
        stats.expect_rebuild_rows().never();

        let cache: Arc<dyn AggregateCache> = Arc::new(StalledCache);
        let tracker = Arc::new(SyncTracker::new());
        let rebuild = Arc::new(RebuildService::new(Arc::new(stats), cache.clone(), tracker));
        let service = AnalyticsService::new(cache, rebuild, Duration::from_millis(250));

        let err = service.get_analytics(9).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::REQUEST_TIMEOUT);
        match err {
            AppError::Timeout { details, .. } => {
                assert!(details["operation"].as_str().unwrap().starts_with("read_"));
                assert_eq!(details["deadline_ms"], 250);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_cache_is_unavailable() {
        let cache = Arc::new(MemoryCache::new());
        cache.set_available(false);

        let result = build(MockStatsRepository::new(), cache).get_analytics(1).await;
        assert!(matches!(result, Err(AppError::Unavailable { .. })));
    }
}
