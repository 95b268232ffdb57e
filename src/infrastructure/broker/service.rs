//! Event broker traits and error types.

use std::time::Duration;

use async_trait::async_trait;

/// Errors that can occur while talking to the broker.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker connection error: {0}")]
    ConnectionError(String),
    #[error("Broker operation error: {0}")]
    OperationError(String),
    #[error("Broker operation {0} timed out")]
    Timeout(&'static str),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// A message delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Broker-assigned delivery id, used for acknowledgement.
    pub id: String,
    /// Partitioning key (the ad id).
    pub key: String,
    /// Encoded event.
    pub payload: String,
}

/// Producer side of the click topic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Appends a message and waits for the broker to acknowledge it.
    ///
    /// # Returns
    ///
    /// The broker-assigned message id.
    async fn publish(&self, key: &str, payload: &str) -> BrokerResult<String>;

    async fn health_check(&self) -> bool;
}

/// Consumer-group side of the click topic.
///
/// Delivery is at-least-once: a message stays pending until acknowledged
/// and can be re-claimed by any member of the group once it is idle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Creates the consumer group if it does not exist yet.
    async fn ensure_group(&self) -> BrokerResult<()>;

    /// Fetches up to `max` new messages without blocking.
    ///
    /// Messages are returned in broker order.
    async fn poll(&self, max: usize) -> BrokerResult<Vec<BrokerMessage>>;

    /// Takes over up to `max` messages left unacknowledged for at least `min_idle`.
    async fn claim_stale(&self, min_idle: Duration, max: usize) -> BrokerResult<Vec<BrokerMessage>>;

    /// Acknowledges processed messages.
    async fn ack(&self, ids: &[String]) -> BrokerResult<()>;
}
