use thiserror::Error;

#[derive(Debug, Error)]
pub enum CampusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream service error ({service}): {reason}")]
    Upstream { service: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CampusError {
    /// Short error code string returned to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            CampusError::Config(_) => "CONFIG_ERROR",
            CampusError::AuthFailed(_) => "AUTH_FAILED",
            CampusError::Validation(_) => "VALIDATION_ERROR",
            CampusError::Conflict(_) => "CONFLICT",
            CampusError::NotFound(_) => "NOT_FOUND",
            CampusError::Database(_) => "DATABASE_ERROR",
            CampusError::Upstream { .. } => "UPSTREAM_ERROR",
            CampusError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CampusError>;
