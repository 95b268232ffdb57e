//! Periodic cache-to-store reconciliation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::analytics::{AdStats, parse_clicks};
use crate::domain::cache_key::{AggregateKey, KeyTag};
use crate::domain::entities::FlushPolicy;
use crate::domain::repositories::AdRepository;
use crate::domain::sync_state::SyncTracker;
use crate::error::AppError;
use crate::infrastructure::cache::AggregateCache;
use crate::shutdown::ShutdownSignal;

/// Counts for one flush tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub scanned: usize,
    pub reconciled: usize,
    /// Keys with no fields, treated as done.
    pub empty: usize,
    /// Keys whose cache value was below the committed store counter.
    pub conflicts: usize,
    pub failed: usize,
    /// Another tick was still running, so this one did nothing.
    pub skipped: bool,
    /// The tick hit its ceiling before every key was processed.
    pub timed_out: bool,
}

enum KeyOutcome {
    Empty,
    Reconciled { conflict: bool },
}

/// Sweeps every `ad-<id>` record and writes its `clicks` into
/// `metadata_ads` under the configured [`FlushPolicy`].
///
/// Cache records are left in place. Only one tick runs at a time; a tick
/// requested while another is running is skipped.
pub struct FlushScheduler {
    cache: Arc<dyn AggregateCache>,
    ads: Arc<dyn AdRepository>,
    tracker: Arc<SyncTracker>,
    policy: FlushPolicy,
    tick_timeout: Duration,
    running: AtomicBool,
}

impl FlushScheduler {
    pub fn new(
        cache: Arc<dyn AggregateCache>,
        ads: Arc<dyn AdRepository>,
        tracker: Arc<SyncTracker>,
        policy: FlushPolicy,
        tick_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            ads,
            tracker,
            policy,
            tick_timeout,
            running: AtomicBool::new(false),
        }
    }

    /// Ticks every `interval` until `shutdown` fires. The first tick runs
    /// one interval after start.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = interval.as_secs(),
            policy = ?self.policy,
            "Flush scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    info!(?report, "Flush tick finished");
                }
            }
        }

        info!("Flush scheduler stopped");
    }

    /// Runs one reconciliation pass.
    pub async fn tick(&self) -> FlushReport {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Previous flush still running, skipping tick");
            return FlushReport {
                skipped: true,
                ..FlushReport::default()
            };
        }

        let mut report = FlushReport::default();
        let finished = tokio::time::timeout(self.tick_timeout, self.sweep(&mut report)).await;
        if finished.is_err() {
            report.timed_out = true;
            warn!(
                timeout_secs = self.tick_timeout.as_secs(),
                processed = report.reconciled + report.empty + report.failed,
                scanned = report.scanned,
                "Flush tick hit its ceiling"
            );
        }

        self.running.store(false, Ordering::SeqCst);
        report
    }

    async fn sweep(&self, report: &mut FlushReport) {
        let keys = match self.cache.scan_keys(KeyTag::Counter).await {
            Ok(keys) => keys,
            Err(e) => {
                error!(error = %e, "Failed to enumerate aggregate keys");
                return;
            }
        };
        report.scanned = keys.len();

        for key in keys {
            match self.flush_key(key).await {
                Ok(KeyOutcome::Empty) => {
                    counter!("flush_keys_total", "outcome" => "empty").increment(1);
                    report.empty += 1;
                }
                Ok(KeyOutcome::Reconciled { conflict }) => {
                    counter!("flush_keys_total", "outcome" => "reconciled").increment(1);
                    report.reconciled += 1;
                    if conflict {
                        report.conflicts += 1;
                    }
                }
                Err(e) => {
                    counter!("flush_keys_total", "outcome" => "failed").increment(1);
                    warn!(key = %key, error = %e, "Failed to flush aggregate");
                    report.failed += 1;
                }
            }
        }
    }

    async fn flush_key(&self, key: AggregateKey) -> Result<KeyOutcome, AppError> {
        let ad_id = key.ad_id;
        let fields = self.cache.read_record(key).await?;
        if fields.is_empty() {
            return Ok(KeyOutcome::Empty);
        }
        let clicks = parse_clicks(ad_id, &fields)?;

        // The stats record is informational here; it is never written back.
        match self.cache.read_record(key.sibling()).await {
            Ok(stats) if !stats.is_empty() => {
                if let Ok(stats) = AdStats::from_fields(ad_id, &stats) {
                    debug!(ad_id, clicks, impression = stats.impression, "Flushing aggregate");
                }
            }
            Ok(_) => debug!(ad_id, clicks, "Flushing aggregate without stats record"),
            Err(e) => debug!(ad_id, error = %e, "Stats record unreadable during flush"),
        }

        let outcome = self.ads.reconcile_clicks(ad_id, clicks, self.policy).await?;
        let conflict = outcome.is_conflict(clicks);
        if conflict {
            warn!(
                ad_id,
                cache_clicks = clicks,
                store_clicks = outcome.previous,
                written = outcome.written,
                policy = ?self.policy,
                "Reconciliation conflict: cache counter behind committed store counter"
            );
        }

        self.tracker.mark_reconciled(ad_id);
        Ok(KeyOutcome::Reconciled { conflict })
    }
}
