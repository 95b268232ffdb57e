//! Handler for per-ad analytics.

use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::json;

use crate::api::dto::analytics::AnalyticsResponse;
use crate::error::AppError;
use crate::state::AppState;

/// Returns clicks, impression and CTR for one ad from the aggregate cache.
///
/// # Endpoint
///
/// `GET /ads/analytics/{id}`
///
/// # Response
///
/// ```json
/// { "ad_id": 42, "clicks": 5, "impression": 2.0, "CTR": 250 }
/// ```
///
/// # Errors
///
/// - 400 if `id` is not a positive integer
/// - 404 if the cache was cold; a rebuild has run, retry shortly
/// - 408 if the cache read timed out
pub async fn analytics_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let ad_id = raw_id
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            AppError::bad_request(
                "Ad id must be a positive integer",
                json!({ "field": "id", "value": raw_id }),
            )
        })?;

    let analytics = state.analytics_service.get_analytics(ad_id).await?;

    Ok(Json(analytics.into()))
}
