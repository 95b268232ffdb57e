//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use crate::application::services::{AdService, AnalyticsService, IngestService, RebuildService};
use crate::domain::repositories::{AdRepository, StatsRepository};
use crate::domain::sync_state::SyncTracker;
use crate::infrastructure::broker::EventPublisher;
use crate::infrastructure::cache::AggregateCache;

/// Connected clients the services are built from.
///
/// Constructed once at startup and passed down; no component reaches for a
/// global handle.
#[derive(Clone)]
pub struct Backends {
    pub cache: Arc<dyn AggregateCache>,
    pub publisher: Arc<dyn EventPublisher>,
    pub ads: Arc<dyn AdRepository>,
    pub stats: Arc<dyn StatsRepository>,
}

/// Request-path deadlines.
#[derive(Debug, Clone, Copy)]
pub struct Deadlines {
    pub publish: Duration,
    pub cache_read: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub ad_service: Arc<AdService>,
    pub ingest_service: Arc<IngestService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub rebuild_service: Arc<RebuildService>,
    pub cache: Arc<dyn AggregateCache>,
    pub publisher: Arc<dyn EventPublisher>,
    pub tracker: Arc<SyncTracker>,
}

impl AppState {
    pub fn new(backends: &Backends, tracker: Arc<SyncTracker>, deadlines: Deadlines) -> Self {
        let rebuild_service = Arc::new(RebuildService::new(
            backends.stats.clone(),
            backends.cache.clone(),
            tracker.clone(),
        ));

        Self {
            ad_service: Arc::new(AdService::new(backends.ads.clone())),
            ingest_service: Arc::new(IngestService::new(
                backends.cache.clone(),
                backends.publisher.clone(),
                tracker.clone(),
                deadlines.publish,
            )),
            analytics_service: Arc::new(AnalyticsService::new(
                backends.cache.clone(),
                rebuild_service.clone(),
                deadlines.cache_read,
            )),
            rebuild_service,
            cache: backends.cache.clone(),
            publisher: backends.publisher.clone(),
            tracker,
        }
    }
}
