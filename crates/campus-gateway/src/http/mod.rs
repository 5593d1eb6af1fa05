pub mod health;
pub mod reminders;
pub mod trigger;

use axum::{http::StatusCode, Json};
use campus_core::CampusError;
use serde_json::{json, Value};

pub type ApiError = (StatusCode, Json<Value>);

/// Map a domain error to its HTTP status and `{error, message}` body.
pub fn error_response(e: CampusError) -> ApiError {
    let status = match &e {
        CampusError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
        CampusError::Validation(_) => StatusCode::BAD_REQUEST,
        CampusError::Conflict(_) => StatusCode::CONFLICT,
        CampusError::NotFound(_) => StatusCode::NOT_FOUND,
        CampusError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        CampusError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        CampusError::Config(_) | CampusError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(json!({"error": e.code(), "message": e.to_string()})),
    )
}
