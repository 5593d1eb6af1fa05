use axum::{
    routing::{get, post},
    Router,
};
use campus_core::CampusConfig;
use campus_reminders::ReminderEngine;
use campus_transit::ArrivalEstimator;
use std::sync::Arc;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CampusConfig,
    pub engine: Arc<ReminderEngine>,
    /// Present only when `[transit]` is configured.
    pub estimator: Option<Arc<dyn ArrivalEstimator>>,
}

impl AppState {
    pub fn new(
        config: CampusConfig,
        engine: Arc<ReminderEngine>,
        estimator: Option<Arc<dyn ArrivalEstimator>>,
    ) -> Self {
        Self {
            config,
            engine,
            estimator,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/reminders",
            post(crate::http::reminders::create_handler).get(crate::http::reminders::list_handler),
        )
        .route(
            "/reminders/{id}",
            get(crate::http::reminders::get_handler).delete(crate::http::reminders::delete_handler),
        )
        .route(
            "/internal/reminders/check",
            get(crate::http::trigger::check_handler).post(crate::http::trigger::check_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use campus_core::{Clock, ManualClock};
    use campus_notify::{SqliteNotificationStore, UnconfiguredPush};
    use campus_reminders::SqliteReminderStore;
    use chrono::{TimeZone, Utc};
    use rusqlite::Connection;

    /// In-memory state with a manual clock at a fixed instant.
    pub fn state(
        secret: Option<&str>,
        estimator: Option<Arc<dyn ArrivalEstimator>>,
    ) -> Arc<AppState> {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        ));
        let conn = Connection::open_in_memory().unwrap();
        campus_reminders::db::init_db(&conn).unwrap();
        let store = Arc::new(SqliteReminderStore::new(conn, clock.clone() as Arc<dyn Clock>));

        let conn = Connection::open_in_memory().unwrap();
        campus_notify::db::init_db(&conn).unwrap();
        let notifications = Arc::new(SqliteNotificationStore::new(conn));

        let mut config = CampusConfig::default();
        config.trigger.secret = secret.map(String::from);
        let engine = Arc::new(ReminderEngine::new(
            store,
            notifications,
            Arc::new(UnconfiguredPush),
            clock,
            &config.reminders,
        ));
        Arc::new(AppState::new(config, engine, estimator))
    }
}
