//! Aggregate cache for near-real-time per-ad metrics.
//!
//! Provides an [`AggregateCache`] trait with two implementations:
//! - [`RedisCache`] - Production Redis-backed cache
//! - [`MemoryCache`] - In-process implementation for tests and tooling

mod memory_cache;
mod redis_cache;
mod service;

pub use memory_cache::MemoryCache;
pub use redis_cache::RedisCache;
pub use service::{AggregateCache, CacheError, CacheResult};

#[cfg(test)]
pub use service::MockAggregateCache;
