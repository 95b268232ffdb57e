//! Application layer services implementing the pipeline's use cases.
//!
//! Services consume repository, cache and broker traits and provide a clean
//! API for HTTP handlers, background loops and the admin CLI.
//!
//! # Available Services
//!
//! - [`services::ingest_service::IngestService`] - Click acceptance and dispatch
//! - [`services::analytics_service::AnalyticsService`] - CTR reads from the cache
//! - [`services::rebuild_service::RebuildService`] - Cache rebuild from the store
//! - [`services::ad_service::AdService`] - Ad listing

pub mod services;
