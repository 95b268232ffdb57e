//! In-process broker with consumer-group semantics.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::service::{BrokerError, BrokerMessage, BrokerResult, EventPublisher, EventSubscriber};

#[derive(Default)]
struct State {
    next_id: u64,
    history: Vec<BrokerMessage>,
    queue: VecDeque<BrokerMessage>,
    pending: BTreeMap<u64, (BrokerMessage, Instant)>,
    acked: usize,
}

/// A single-group broker kept in process memory.
///
/// Mirrors the Redis Streams behavior the pipeline relies on: ordered
/// delivery, pending entries until acknowledgement, and re-claiming of
/// idle pending entries. Used by integration tests.
#[derive(Default)]
pub struct MemoryBroker {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Every message ever published, in order.
    pub fn published(&self) -> Vec<BrokerMessage> {
        self.with_state(|s| s.history.clone())
    }

    /// Injects a raw message as if another producer had written it.
    pub fn inject(&self, key: &str, payload: &str) -> String {
        self.with_state(|s| Self::append(s, key, payload))
    }

    pub fn pending_count(&self) -> usize {
        self.with_state(|s| s.pending.len())
    }

    pub fn acked_count(&self) -> usize {
        self.with_state(|s| s.acked)
    }

    fn append(state: &mut State, key: &str, payload: &str) -> String {
        state.next_id += 1;
        let message = BrokerMessage {
            id: format!("{}-0", state.next_id),
            key: key.to_string(),
            payload: payload.to_string(),
        };
        state.history.push(message.clone());
        state.queue.push_back(message.clone());
        message.id
    }

    fn check(&self) -> BrokerResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::ConnectionError(
                "in-memory broker disabled".to_string(),
            ));
        }
        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

fn sequence(id: &str) -> Option<u64> {
    id.split_once('-').and_then(|(seq, _)| seq.parse().ok())
}

#[async_trait]
impl EventPublisher for MemoryBroker {
    async fn publish(&self, key: &str, payload: &str) -> BrokerResult<String> {
        self.check()?;
        Ok(self.with_state(|s| Self::append(s, key, payload)))
    }

    async fn health_check(&self) -> bool {
        self.check().is_ok()
    }
}

#[async_trait]
impl EventSubscriber for MemoryBroker {
    async fn ensure_group(&self) -> BrokerResult<()> {
        self.check()
    }

    async fn poll(&self, max: usize) -> BrokerResult<Vec<BrokerMessage>> {
        self.check()?;
        Ok(self.with_state(|s| {
            let take = max.min(s.queue.len());
            let batch: Vec<BrokerMessage> = s.queue.drain(..take).collect();
            let now = Instant::now();
            for message in &batch {
                if let Some(seq) = sequence(&message.id) {
                    s.pending.insert(seq, (message.clone(), now));
                }
            }
            batch
        }))
    }

    async fn claim_stale(&self, min_idle: Duration, max: usize) -> BrokerResult<Vec<BrokerMessage>> {
        self.check()?;
        Ok(self.with_state(|s| {
            let now = Instant::now();
            s.pending
                .values_mut()
                .filter(|(_, delivered)| now.duration_since(*delivered) >= min_idle)
                .take(max)
                .map(|(message, delivered)| {
                    *delivered = now;
                    message.clone()
                })
                .collect()
        }))
    }

    async fn ack(&self, ids: &[String]) -> BrokerResult<()> {
        self.check()?;
        self.with_state(|s| {
            for id in ids {
                if let Some(seq) = sequence(id)
                    && s.pending.remove(&seq).is_some()
                {
                    s.acked += 1;
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivery_is_ordered_and_pending_until_acked() {
        let broker = MemoryBroker::new();
        broker.publish("1", "a").await.unwrap();
        broker.publish("2", "b").await.unwrap();
        broker.publish("1", "c").await.unwrap();

        let batch = broker.poll(10).await.unwrap();
        let payloads: Vec<&str> = batch.iter().map(|m| m.payload.as_str()).collect();
        assert_eq!(payloads, vec!["a", "b", "c"]);
        assert_eq!(broker.pending_count(), 3);

        broker.ack(&[batch[0].id.clone()]).await.unwrap();
        assert_eq!(broker.pending_count(), 2);
        assert_eq!(broker.acked_count(), 1);
        assert!(broker.poll(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unacked_messages_can_be_reclaimed() {
        let broker = MemoryBroker::new();
        broker.publish("7", "x").await.unwrap();
        let first = broker.poll(1).await.unwrap();

        let claimed = broker.claim_stale(Duration::ZERO, 10).await.unwrap();
        assert_eq!(claimed, first);

        let claimed = broker
            .claim_stale(Duration::from_secs(3600), 10)
            .await
            .unwrap();
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_broker_rejects_publish() {
        let broker = MemoryBroker::new();
        broker.set_available(false);
        assert!(broker.publish("1", "x").await.is_err());
        assert!(broker.published().is_empty());
    }
}
