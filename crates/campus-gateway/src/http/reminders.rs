//! Owner-facing reminder endpoints.
//!
//! The caller's identity arrives in the `x-user-id` header, set by the auth
//! layer in front of this service.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use campus_core::CampusError;
use campus_reminders::{Direction, NewReminder, Reminder};
use campus_transit::ArrivalEstimator;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use super::{error_response, ApiError};
use crate::app::AppState;

pub const USER_HEADER: &str = "x-user-id";

/// Body of POST /reminders. `estimatedSecondsToArrival` may be omitted when
/// the transit API is configured.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReminderBody {
    #[serde(default)]
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: String,
    #[serde(default)]
    pub route_id: String,
    #[serde(default)]
    pub route_name: String,
    pub direction: Option<i64>,
    pub estimated_seconds_to_arrival: Option<i64>,
}

/// POST /reminders
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<CreateReminderBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Reminder>), ApiError> {
    let user_id = caller(&headers)?;
    let Json(body) = body.map_err(|rejection| validation(&rejection.body_text()))?;
    let direction = body
        .direction
        .ok_or_else(|| validation("'direction' is required"))?;
    let direction = Direction::try_from(direction).map_err(|e| validation(&e.to_string()))?;

    let estimated_seconds_to_arrival = match body.estimated_seconds_to_arrival {
        Some(secs) => secs,
        None => estimate(&state, &body.route_id, &body.stop_id, direction).await?,
    };

    let reminder = state
        .engine
        .create_reminder(NewReminder {
            user_id,
            stop_id: body.stop_id,
            stop_name: body.stop_name,
            route_id: body.route_id,
            route_name: body.route_name,
            direction: direction.as_i64(),
            estimated_seconds_to_arrival,
        })
        .map_err(|e| error_response(e.into()))?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

/// GET /reminders
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller(&headers)?;
    let reminders = state
        .engine
        .list_reminders(&user_id)
        .map_err(|e| error_response(e.into()))?;
    Ok(Json(json!({ "reminders": reminders })))
}

/// GET /reminders/{id}
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Reminder>, ApiError> {
    let user_id = caller(&headers)?;
    state
        .engine
        .get_reminder(&user_id, &id)
        .map(Json)
        .map_err(|e| error_response(e.into()))
}

/// DELETE /reminders/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = caller(&headers)?;
    state
        .engine
        .delete_reminder(&user_id, &id)
        .map_err(|e| error_response(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

fn caller(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            error_response(CampusError::AuthFailed(format!(
                "missing {USER_HEADER} header"
            )))
        })
}

fn validation(msg: &str) -> ApiError {
    error_response(CampusError::Validation(msg.to_string()))
}

/// Ask the transit API how far away the next bus is.
async fn estimate(
    state: &AppState,
    route_id: &str,
    stop_id: &str,
    direction: Direction,
) -> Result<i64, ApiError> {
    let estimator = state.estimator.as_ref().ok_or_else(|| {
        validation("'estimatedSecondsToArrival' is required when no transit API is configured")
    })?;

    match estimator
        .estimate_seconds(route_id, stop_id, u8::from(direction))
        .await
    {
        Ok(Some(secs)) => Ok(secs),
        Ok(None) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "NO_ESTIMATE",
                "message": format!("no bus currently expected at stop {stop_id} on route {route_id}"),
            })),
        )),
        Err(e) => {
            warn!(route_id, stop_id, error = %e, "transit estimate lookup failed");
            Err(error_response(CampusError::Upstream {
                service: "transit".to_string(),
                reason: e.to_string(),
            }))
        }
    }
}
