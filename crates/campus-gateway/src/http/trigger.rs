//! Reminder check endpoint: GET|POST /internal/reminders/check.
//!
//! Runs one reminder cycle and returns its summary. Meant for platform cron
//! jobs and operators; the in-process poll loop calls the same engine. Any
//! number of overlapping calls is safe.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use campus_core::CampusError;
use campus_reminders::CycleSummary;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{error, warn};

use super::{error_response, ApiError};
use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Run one cycle. Individual reminder failures are reported in the summary;
/// only an unreachable store produces 503.
pub async fn check_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CycleSummary>, ApiError> {
    if let Some(secret) = state.config.trigger.secret.as_deref() {
        verify_bearer_token(&headers, secret).map_err(|reason| {
            warn!(reason = %reason, "reminder check authentication failed");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "AUTH_FAILED", "message": reason})),
            )
        })?;
    }

    state.engine.run_cycle().await.map(Json).map_err(|e| {
        error!(error = %e, "reminder cycle failed");
        error_response(CampusError::from(e))
    })
}

/// Check `Authorization: Bearer <token>` against `expected` in constant time.
fn verify_bearer_token(headers: &HeaderMap, expected: &str) -> Result<(), String> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing Authorization header".to_string())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;

    if constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err("bearer token mismatch".to_string())
    }
}

/// Compares fixed-length MACs of both inputs, so neither content nor length
/// leaks through timing. `verify_slice` is itself constant time.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    const KEY: &[u8] = b"campus-trigger-compare";
    let (Ok(mut mac_a), Ok(mut mac_b)) = (
        HmacSha256::new_from_slice(KEY),
        HmacSha256::new_from_slice(KEY),
    ) else {
        return false;
    };
    mac_b.update(b);
    let expected = mac_b.finalize().into_bytes();
    mac_a.update(a);
    mac_a.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{build_router, test_support};
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    fn check(token: Option<&str>) -> Request<Body> {
        let mut req = Request::post("/internal/reminders/check");
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        req.body(Body::empty()).unwrap()
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3cre"));
        assert!(!constant_time_eq(b"s3cret", b"S3cret"));
        assert!(!constant_time_eq(b"", b"s3cret"));
    }

    #[test]
    fn bearer_scheme_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic s3cret".parse().unwrap());
        assert!(verify_bearer_token(&headers, "s3cret").is_err());
        assert!(verify_bearer_token(&HeaderMap::new(), "s3cret").is_err());
    }

    #[tokio::test]
    async fn check_requires_the_configured_secret() {
        let app = build_router(test_support::state(Some("s3cret"), None));

        let resp = app.clone().oneshot(check(None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let resp = app.clone().oneshot(check(Some("wrong"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app.oneshot(check(Some("s3cret"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let summary: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(summary["scanned"], 0);
        assert_eq!(summary["errors"], 0);
    }

    #[tokio::test]
    async fn check_is_open_without_a_secret() {
        let app = build_router(test_support::state(None, None));
        let resp = app
            .oneshot(
                Request::get("/internal/reminders/check")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
