use campus_core::CampusError;
use thiserror::Error;

use crate::types::Direction;

/// Errors that can occur within the reminder subsystem.
#[derive(Debug, Error)]
pub enum ReminderError {
    /// Malformed creation input. Nothing was persisted.
    #[error("Invalid reminder: {0}")]
    Validation(String),

    /// An active reminder already covers this (user, stop, route, direction).
    #[error("An active reminder already exists for stop {stop_id} on route {route_id} ({direction})")]
    DuplicateActive {
        stop_id: String,
        route_id: String,
        direction: Direction,
    },

    /// No reminder with the given ID is visible to the caller.
    #[error("Reminder not found: {id}")]
    NotFound { id: String },

    /// The store could not be reached or refused the operation.
    #[error("Reminder store unavailable: {0}")]
    Store(#[from] rusqlite::Error),

    /// A previous holder of the store lock panicked.
    #[error("Reminder store lock poisoned")]
    LockPoisoned,
}

impl ReminderError {
    /// True for failures of the store itself rather than of the request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, ReminderError::Store(_) | ReminderError::LockPoisoned)
    }
}

impl From<ReminderError> for CampusError {
    fn from(e: ReminderError) -> Self {
        match e {
            ReminderError::Validation(msg) => CampusError::Validation(msg),
            e @ ReminderError::DuplicateActive { .. } => CampusError::Conflict(e.to_string()),
            e @ ReminderError::NotFound { .. } => CampusError::NotFound(e.to_string()),
            e => CampusError::Database(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReminderError>;
