//! Error types for the famcal sync engine.

use thiserror::Error;

use crate::notion::NotionApiError;

/// Errors that can occur in famcal operations.
#[derive(Error, Debug)]
pub enum FamCalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Invalid calendar format: {0}")]
    InvalidFormat(String),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error(transparent)]
    Notion(#[from] NotionApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for FamCalError {
    fn from(err: serde_json::Error) -> Self {
        FamCalError::Serialization(err.to_string())
    }
}

/// Result type alias for famcal operations.
pub type FamCalResult<T> = Result<T, FamCalError>;
