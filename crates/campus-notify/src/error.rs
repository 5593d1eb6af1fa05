use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("notification store lock poisoned")]
    LockPoisoned,

    #[error("realtime push failed: {0}")]
    Push(String),

    #[error("realtime push is not configured")]
    PushNotConfigured,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
