//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /ads`                 - Ad listing
//! - `POST /ads/click`           - Click ingestion (rate limited)
//! - `GET  /ads/analytics/{id}`  - Per-ad metrics
//! - `GET  /health`              - Database, cache and broker checks
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Rate limiting** - Per-IP token bucket on click ingestion
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::health_handler;
use crate::api::middleware::{rate_limit, tracing};
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// How click ingestion is rate limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    /// No limiter. The router then works without `ConnectInfo`.
    Disabled,
    /// Keyed by the socket peer address.
    PeerIp,
    /// Keyed by `X-Forwarded-For` / `X-Real-IP`; only behind a trusted proxy.
    Forwarded,
}

impl RateLimit {
    pub fn for_deployment(behind_proxy: bool) -> Self {
        if behind_proxy {
            RateLimit::Forwarded
        } else {
            RateLimit::PeerIp
        }
    }
}

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState, limit: RateLimit) -> NormalizePath<Router> {
    let click_router = api::routes::click_routes();
    let click_router = match limit {
        RateLimit::Disabled => click_router,
        RateLimit::PeerIp => click_router.layer(rate_limit::layer()),
        RateLimit::Forwarded => click_router.layer(rate_limit::proxied_layer()),
    };

    let router = Router::new()
        .merge(api::routes::ad_routes())
        .merge(click_router)
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(tracing::layer());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
