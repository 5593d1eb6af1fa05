use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransitError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, TransitError>;
