//! Durable store implementations.
//!
//! Concrete implementations of domain repository traits using SQLx runtime
//! queries against PostgreSQL, plus an in-process store.
//!
//! # Repositories
//!
//! - [`PgAdRepository`] - Ad metadata and click counter
//! - [`PgStatsRepository`] - Click rows and rebuild aggregates
//! - [`MemoryStore`] - Both traits in memory, for tests and tooling

pub mod memory_store;
pub mod pg_ad_repository;
pub mod pg_stats_repository;

pub use memory_store::MemoryStore;
pub use pg_ad_repository::PgAdRepository;
pub use pg_stats_repository::PgStatsRepository;
