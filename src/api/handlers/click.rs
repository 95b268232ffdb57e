//! Handler for click submission.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde_json::Value;

use crate::api::dto::click::ClickAcceptedResponse;
use crate::error::AppError;
use crate::state::AppState;

/// Accepts one click event.
///
/// # Endpoint
///
/// `POST /ads/click`
///
/// # Request Body
///
/// ```json
/// { "id": 42, "ip": "1.2.3.4", "playback_time": 50, "timeframe": 25 }
/// ```
///
/// # Response
///
/// ```json
/// { "status": "success", "message": "Click event received" }
/// ```
///
/// The response waits for the broker to acknowledge the event but not for
/// the aggregate cache update.
///
/// # Errors
///
/// - 400 with `details.field` naming the first invalid field, including a
///   field of the wrong JSON type (`details.constraint` is then `type`)
/// - 400 if the body is not JSON
/// - 500 if the broker rejects the event or times out
pub async fn click_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ClickAcceptedResponse>, AppError> {
    let Json(body) = payload?;

    state.ingest_service.ingest_json(body).await?;

    Ok(Json(ClickAcceptedResponse::accepted()))
}
