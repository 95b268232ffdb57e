//! Event broker carrying click events from ingestion to persistence.
//!
//! - [`EventPublisher`] / [`EventSubscriber`] - Producer and consumer-group traits
//! - [`RedisStreamBroker`] - Redis Streams implementation
//! - [`MemoryBroker`] - In-process implementation for tests

mod memory_broker;
mod redis_stream;
mod service;

pub use memory_broker::MemoryBroker;
pub use redis_stream::{RedisStreamBroker, StreamSettings};
pub use service::{BrokerError, BrokerMessage, BrokerResult, EventPublisher, EventSubscriber};

#[cfg(test)]
pub use service::{MockEventPublisher, MockEventSubscriber};
