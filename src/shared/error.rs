use serde::Serialize;
use thiserror::Error;

/// Application errors that are not translation outcomes.
///
/// Translation failures are classified separately by the gateway
/// (`TranslateError`) and only ever show up as session status.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// Caller-correctable input (empty, over-length, same-language pair)
    #[error("Validation Error: {0}")]
    Validation(String),

    /// Durable history write or read failed; persisted state is unchanged
    #[error("Storage Error: {0}")]
    Storage(String),

    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("System Error: {0}")]
    System(String),
}

impl AppError {
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, AppError::Storage(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(format!("Serialization error: {}", err))
    }
}

impl From<redb::Error> for AppError {
    fn from(err: redb::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
