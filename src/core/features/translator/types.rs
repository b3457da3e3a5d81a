use serde::Serialize;
use thiserror::Error;

use crate::shared::error::{AppError, AppResult};
use crate::shared::types::{character_count, Language, Translation, MAX_LENGTH};

/// A validated gateway request: trimmed non-empty text within the length
/// limit and a pair of distinct languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationRequest {
    text: String,
    source: Language,
    target: Language,
}

impl TranslationRequest {
    pub fn new(text: &str, source: Language, target: Language) -> AppResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Text to translate is empty".to_string()));
        }
        if character_count(text) > MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "Text exceeds maximum length of {} characters",
                MAX_LENGTH
            )));
        }
        if source == target {
            return Err(AppError::Validation(format!(
                "Source and target language are both {}",
                source
            )));
        }
        Ok(Self {
            text: text.to_string(),
            source,
            target,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> Language {
        self.source
    }

    pub fn target(&self) -> Language {
        self.target
    }
}

/// Gateway failure, classified once at the boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// No connectivity or timeout; retry later
    #[error("Network error: {0}")]
    Network(String),

    /// The service declined the input; retrying the same request will not help
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Service-side fault; retry later
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl TranslateError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TranslateError::Network(_) | TranslateError::Unavailable(_))
    }

    /// Description shown to the user. Never includes the transport detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            TranslateError::Network(_) => "You appear to be offline. Check your connection and try again.",
            TranslateError::Rejected(_) => "The translation service could not translate this text.",
            TranslateError::Unavailable(_) => {
                "The translation service is temporarily unavailable. Please try again later."
            }
        }
    }
}

impl From<reqwest::Error> for TranslateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            TranslateError::Network(err.to_string())
        } else if err.is_decode() || err.is_body() {
            TranslateError::Unavailable(err.to_string())
        } else if let Some(status) = err.status() {
            classify_status(status.as_u16(), err.to_string())
        } else {
            TranslateError::Network(err.to_string())
        }
    }
}

/// Map a non-success HTTP status to a failure kind.
pub fn classify_status(status: u16, detail: String) -> TranslateError {
    match status {
        408 => TranslateError::Network(detail),
        400..=499 => TranslateError::Rejected(detail),
        _ => TranslateError::Unavailable(detail),
    }
}

pub type TranslateResult = Result<Translation, TranslateError>;
