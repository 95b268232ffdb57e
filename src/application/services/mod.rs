//! Business logic services for the application layer.

pub mod ad_service;
pub mod analytics_service;
pub mod ingest_service;
pub mod rebuild_service;

pub use ad_service::AdService;
pub use analytics_service::AnalyticsService;
pub use ingest_service::{IngestService, Ingested};
pub use rebuild_service::{RebuildReport, RebuildService};
