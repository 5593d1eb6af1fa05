use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe, returns server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let reminders = &state.config.reminders;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "poll_loop": reminders.poll_interval_secs > 0,
        "lead_window_secs": state.engine.lead_window().num_seconds(),
        "transit": state.estimator.is_some(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support;

    #[tokio::test]
    async fn health_reports_engine_settings() {
        let Json(body) = health_handler(State(test_support::state(None, None))).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["lead_window_secs"], 300);
        assert_eq!(body["transit"], false);
    }
}
