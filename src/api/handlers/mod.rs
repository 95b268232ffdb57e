//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod ads;
pub mod analytics;
pub mod click;
pub mod health;

pub use ads::list_ads_handler;
pub use analytics::analytics_handler;
pub use click::click_handler;
pub use health::health_handler;
