//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for persistence, caching and messaging.
//!
//! # Modules
//!
//! - [`cache`] - Aggregate cache (Redis and in-memory implementations)
//! - [`broker`] - Click event broker (Redis Streams and in-memory implementations)
//! - [`persistence`] - PostgreSQL repository implementations and an in-memory store

pub mod broker;
pub mod cache;
pub mod persistence;
