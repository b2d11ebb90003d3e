//! Application errors

use http::StatusCode;
use kennel_core::StoreError;
use thiserror::Error;

/// Result type for application operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors raised while serving dog requests.
#[derive(Debug, Error)]
pub enum AppError {
    /// Record store failure (open, migration or a single operation)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// `:id` route parameter that is not an integer
    #[error("invalid dog id: {0:?}")]
    InvalidId(String),

    /// Method name that is not a valid HTTP token
    #[error("unsupported method: {0}")]
    Method(String),

    /// Request line that cannot be parsed
    #[error("malformed request: {0}")]
    Request(String),

    /// Configuration or form body that is not valid JSON
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration values out of range
    #[error("invalid config: {0}")]
    Config(String),
}

impl AppError {
    /// HTTP status a response for this error carries.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidId(_)
            | AppError::Method(_)
            | AppError::Request(_)
            | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
