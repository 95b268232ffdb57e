//! Click ingestion: validation, optimistic cache update and broker publish.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::domain::analytics::AdStats;
use crate::domain::click_event::{ClickEvent, ClickSubmission, FieldViolation};
use crate::domain::sync_state::SyncTracker;
use crate::error::AppError;
use crate::infrastructure::broker::EventPublisher;
use crate::infrastructure::cache::AggregateCache;

fn rejected(violation: FieldViolation) -> AppError {
    counter!("clicks_rejected_total").increment(1);
    tracing::debug!(field = %violation.field, constraint = %violation.constraint, "click rejected");
    AppError::from(violation)
}

/// An accepted click.
pub struct Ingested {
    pub event: ClickEvent,
    /// Broker-assigned message id.
    pub message_id: String,
    /// Background cache update. It logs its own failure; awaiting it is
    /// optional and only tells when the cache has caught up.
    pub cache_update: JoinHandle<()>,
}

/// Service behind `POST /ads/click`.
///
/// The cache update and the broker publish start together. Only the publish
/// outcome decides the response: the cache is a reconciled view, so a failed
/// cache write is logged and left to flush/rebuild.
pub struct IngestService {
    cache: Arc<dyn AggregateCache>,
    publisher: Arc<dyn EventPublisher>,
    tracker: Arc<SyncTracker>,
    publish_timeout: Duration,
}

impl IngestService {
    pub fn new(
        cache: Arc<dyn AggregateCache>,
        publisher: Arc<dyn EventPublisher>,
        tracker: Arc<SyncTracker>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            publisher,
            tracker,
            publish_timeout,
        }
    }

    /// Reads a click from a JSON body and ingests it.
    ///
    /// # Errors
    ///
    /// As [`Self::ingest`], plus [`AppError::Validation`] with constraint
    /// `type` when a field has the wrong JSON type.
    pub async fn ingest_json(&self, body: Value) -> Result<Ingested, AppError> {
        let submission = ClickSubmission::from_json(body).map_err(rejected)?;
        self.ingest(submission).await
    }

    /// Validates, stamps and dispatches one click.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] naming the first invalid field, or
    /// [`AppError::Unavailable`] if the broker rejects the event or does not
    /// acknowledge it within the publish timeout.
    pub async fn ingest(&self, submission: ClickSubmission) -> Result<Ingested, AppError> {
        let event = submission.into_event(Utc::now()).map_err(rejected)?;

        let payload = event.encode().map_err(|e| {
            AppError::internal("Failed to encode click event", json!({ "reason": e.to_string() }))
        })?;

        let cache_update = self.spawn_cache_update(&event);

        let published = tokio::time::timeout(
            self.publish_timeout,
            self.publisher.publish(&event.broker_key(), &payload),
        )
        .await;

        let message_id = match published {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                counter!("clicks_publish_failed_total").increment(1);
                tracing::error!(ad_id = event.ad_id, error = %e, "failed to publish click event");
                return Err(e.into());
            }
            Err(_) => {
                counter!("clicks_publish_failed_total").increment(1);
                tracing::error!(
                    ad_id = event.ad_id,
                    timeout_ms = self.publish_timeout.as_millis() as u64,
                    "broker publish timed out"
                );
                return Err(AppError::unavailable(
                    "Event broker did not acknowledge in time",
                    json!({
                        "operation": "publish",
                        "deadline_ms": self.publish_timeout.as_millis() as u64,
                    }),
                ));
            }
        };

        counter!("clicks_accepted_total").increment(1);
        tracing::debug!(ad_id = event.ad_id, message_id = %message_id, "click accepted");

        Ok(Ingested {
            event,
            message_id,
            cache_update,
        })
    }

    fn spawn_cache_update(&self, event: &ClickEvent) -> JoinHandle<()> {
        let cache = Arc::clone(&self.cache);
        let tracker = Arc::clone(&self.tracker);
        let ad_id = event.ad_id;
        let stats = AdStats::from_playback(event.playback_time, event.timeframe);

        tokio::spawn(async move {
            match cache.record_click(ad_id, &stats).await {
                Ok(clicks) => {
                    tracker.mark_ingested(ad_id);
                    tracing::trace!(ad_id, clicks, "aggregate cache updated");
                }
                Err(e) => {
                    tracing::warn!(ad_id, error = %e, "aggregate cache update failed");
                }
            }
        })
    }
}
