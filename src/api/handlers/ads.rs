//! Handler for the ad listing.

use axum::{Json, extract::State};

use crate::api::dto::ads::AdItem;
use crate::error::AppError;
use crate::state::AppState;

/// Lists every ad.
///
/// # Endpoint
///
/// `GET /ads`
///
/// # Response
///
/// ```json
/// [
///   { "id": 42, "image_url": "https://cdn.example.com/42.png", "target_url": "https://example.com" }
/// ]
/// ```
///
/// # Errors
///
/// Returns 500 if the durable store cannot be read.
pub async fn list_ads_handler(State(state): State<AppState>) -> Result<Json<Vec<AdItem>>, AppError> {
    let ads = state.ad_service.list_ads().await?;
    Ok(Json(ads.into_iter().map(AdItem::from).collect()))
}
