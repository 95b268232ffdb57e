//! Event consumer: drains the click topic into the durable store.
//!
//! Each batch is grouped by message key (the ad id). Groups run in parallel
//! up to `concurrency`; messages inside a group run one after another in
//! delivery order. Per message:
//!
//! 1. Decode. A payload that does not decode is logged and acknowledged so
//!    it is never redelivered.
//! 2. Insert the click row, retrying transient failures with jittered
//!    exponential backoff. If it still fails the message is left pending
//!    and comes back through [`ClickWorker::reclaim_once`].
//! 3. Increment `metadata_ads.clicks` in its own transaction. A failure
//!    here is logged only; the row is already durable.
//!
//! A failing message never stops the loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info, warn};

use crate::domain::click_event::ClickEvent;
use crate::domain::entities::ClickRow;
use crate::domain::repositories::{AdRepository, StatsRepository};
use crate::error::AppError;
use crate::infrastructure::broker::{BrokerError, BrokerMessage, EventSubscriber};
use crate::shutdown::ShutdownSignal;

/// Attempts per row insert, including the first one.
const INSERT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct ClickWorkerSettings {
    /// Ad keys processed in parallel.
    pub concurrency: usize,
    /// Messages fetched per poll.
    pub batch_size: usize,
    /// Sleep after an empty poll.
    pub idle: Duration,
    /// Pending messages idle this long are re-claimed.
    pub claim_idle: Duration,
}

impl Default for ClickWorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            batch_size: 10,
            idle: Duration::from_millis(250),
            claim_idle: Duration::from_secs(30),
        }
    }
}

/// Counts for one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub received: usize,
    pub persisted: usize,
    /// Undecodable messages, acknowledged and dropped.
    pub skipped: usize,
    /// Messages left pending for redelivery.
    pub failed: usize,
}

enum Outcome {
    Persisted,
    Poison,
    Failed,
}

#[derive(Clone)]
struct Persister {
    stats: Arc<dyn StatsRepository>,
    ads: Arc<dyn AdRepository>,
}

impl Persister {
    async fn handle(&self, message: &BrokerMessage) -> Outcome {
        let event = match ClickEvent::decode(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                counter!("consumer_messages_total", "outcome" => "decode_error").increment(1);
                warn!(
                    message_id = %message.id,
                    key = %message.key,
                    error = %e,
                    "Skipping undecodable click message"
                );
                return Outcome::Poison;
            }
        };

        if message.key != event.broker_key() {
            warn!(
                message_id = %message.id,
                key = %message.key,
                ad_id = event.ad_id,
                "Message key does not match event ad id"
            );
        }

        let row = ClickRow::from(&event);
        let strategy = ExponentialBackoff::from_millis(10)
            .map(jitter)
            .take(INSERT_ATTEMPTS - 1);

        let inserted = RetryIf::start(
            strategy,
            || self.stats.record_click(&row),
            |e: &AppError| e.is_transient(),
        )
        .await;

        if let Err(e) = inserted {
            counter!("consumer_messages_total", "outcome" => "insert_failed").increment(1);
            error!(
                message_id = %message.id,
                ad_id = event.ad_id,
                error = %e,
                "Failed to persist click row, leaving message pending"
            );
            return Outcome::Failed;
        }

        match self.ads.increment_clicks(event.ad_id).await {
            Ok(true) => {
                counter!("consumer_messages_total", "outcome" => "persisted").increment(1);
            }
            Ok(false) => {
                counter!("consumer_messages_total", "outcome" => "unknown_ad").increment(1);
                warn!(ad_id = event.ad_id, "Click row stored for an ad without metadata");
            }
            Err(e) => {
                counter!("consumer_messages_total", "outcome" => "counter_failed").increment(1);
                warn!(
                    ad_id = event.ad_id,
                    error = %e,
                    "Click row stored but counter increment failed"
                );
            }
        }

        Outcome::Persisted
    }
}

pub struct ClickWorker {
    subscriber: Arc<dyn EventSubscriber>,
    persister: Persister,
    settings: ClickWorkerSettings,
}

impl ClickWorker {
    pub fn new(
        subscriber: Arc<dyn EventSubscriber>,
        stats: Arc<dyn StatsRepository>,
        ads: Arc<dyn AdRepository>,
        settings: ClickWorkerSettings,
    ) -> Self {
        Self {
            subscriber,
            persister: Persister { stats, ads },
            settings,
        }
    }

    /// Consumes until `shutdown` fires. The batch in progress is finished
    /// before returning.
    pub async fn run(self, shutdown: ShutdownSignal) {
        let retry_delay = self.settings.idle.max(Duration::from_secs(1));
        while let Err(e) = self.subscriber.ensure_group().await {
            error!(error = %e, "Failed to create consumer group, retrying");
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = tokio::time::sleep(retry_delay) => {}
            }
        }
        info!(
            concurrency = self.settings.concurrency,
            batch_size = self.settings.batch_size,
            "Click worker started"
        );

        let mut last_claim: Option<Instant> = None;

        while !shutdown.is_triggered() {
            if last_claim.is_none_or(|at| at.elapsed() >= self.settings.claim_idle) {
                last_claim = Some(Instant::now());
                match self.reclaim_once().await {
                    Ok(report) if report.received > 0 => {
                        info!(?report, "Re-processed pending click messages");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Failed to re-claim pending messages"),
                }
            }

            let received = match self.drain_once().await {
                Ok(report) => {
                    if report.received > 0 {
                        debug!(?report, "Click batch processed");
                    }
                    report.received
                }
                Err(e) => {
                    warn!(error = %e, "Click poll failed");
                    0
                }
            };

            if received == 0 {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(self.settings.idle) => {}
                }
            }
        }

        info!("Click worker stopped");
    }

    /// Polls one batch of new messages and processes it.
    ///
    /// # Errors
    ///
    /// Returns the broker error if polling or acknowledging failed. Messages
    /// that were not acknowledged are redelivered later.
    pub async fn drain_once(&self) -> Result<DrainReport, BrokerError> {
        let batch = self.subscriber.poll(self.settings.batch_size).await?;
        self.process(batch).await
    }

    /// Re-claims messages left pending longer than `claim_idle` and
    /// processes them.
    ///
    /// # Errors
    ///
    /// Returns the broker error if claiming or acknowledging failed.
    pub async fn reclaim_once(&self) -> Result<DrainReport, BrokerError> {
        let batch = self
            .subscriber
            .claim_stale(self.settings.claim_idle, self.settings.batch_size)
            .await?;
        self.process(batch).await
    }

    async fn process(&self, batch: Vec<BrokerMessage>) -> Result<DrainReport, BrokerError> {
        let mut report = DrainReport {
            received: batch.len(),
            ..DrainReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        let mut by_key: BTreeMap<String, Vec<BrokerMessage>> = BTreeMap::new();
        for message in batch {
            by_key.entry(message.key.clone()).or_default().push(message);
        }

        let permits = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (_, messages) in by_key {
            let persister = self.persister.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let mut outcomes = Vec::with_capacity(messages.len());
                for message in messages {
                    let outcome = persister.handle(&message).await;
                    outcomes.push((message.id, outcome));
                }
                outcomes
            });
        }

        let mut to_ack = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcomes) => {
                    for (id, outcome) in outcomes {
                        match outcome {
                            Outcome::Persisted => {
                                report.persisted += 1;
                                to_ack.push(id);
                            }
                            Outcome::Poison => {
                                report.skipped += 1;
                                to_ack.push(id);
                            }
                            Outcome::Failed => report.failed += 1,
                        }
                    }
                }
                // The group's messages stay pending and are re-claimed later.
                Err(e) => error!(error = %e, "Click worker task failed"),
            }
        }

        if !to_ack.is_empty() {
            self.subscriber.ack(&to_ack).await?;
        }

        Ok(report)
    }
}
