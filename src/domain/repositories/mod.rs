//! Repository trait definitions for the domain layer.
//!
//! These traits abstract the durable store. Implementations live in
//! `crate::infrastructure::persistence`; mock implementations are
//! auto-generated via `mockall` for unit tests.
//!
//! # Available Repositories
//!
//! - [`AdRepository`] - Ad metadata and the denormalized click counter
//! - [`StatsRepository`] - Persisted click rows and rebuild aggregates

pub mod ad_repository;
pub mod stats_repository;

pub use ad_repository::AdRepository;
pub use stats_repository::StatsRepository;

#[cfg(test)]
pub use ad_repository::MockAdRepository;
#[cfg(test)]
pub use stats_repository::MockStatsRepository;
