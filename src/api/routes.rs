//! API route configuration.

use crate::api::handlers::{analytics_handler, click_handler, list_ads_handler};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Read endpoints.
///
/// - `GET /ads`                 - List ads
/// - `GET /ads/analytics/{id}`  - Clicks, impression and CTR for one ad
pub fn ad_routes() -> Router<AppState> {
    Router::new()
        .route("/ads", get(list_ads_handler))
        .route("/ads/analytics/{id}", get(analytics_handler))
}

/// Click ingestion.
///
/// - `POST /ads/click` - Submit a click event
pub fn click_routes() -> Router<AppState> {
    Router::new().route("/ads/click", post(click_handler))
}
