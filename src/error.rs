// src/error.rs

use thiserror::Error;

/// Caller input that fails a precondition. Reported before any provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing-input")]
    MissingInput,

    #[error("levels-out-of-range: {0} (allowed 1-4)")]
    LevelsOutOfRange(i64),

    #[error("unknown-search-type: {0}")]
    UnknownSearchType(String),
}

impl ValidationError {
    /// Stable kebab-case code, independent of the display text.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingInput => "missing-input",
            ValidationError::LevelsOutOfRange(_) => "levels-out-of-range",
            ValidationError::UnknownSearchType(_) => "unknown-search-type",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider request failed: {status} - {body}")]
    Provider { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl AppError {
    /// HTTP status used when the error crosses the API boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Provider { .. } | AppError::Transport(_) => 502,
            AppError::Configuration(_) | AppError::SchemaMismatch(_) | AppError::Decode(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_codes_are_stable() {
        let err = AppError::from(ValidationError::MissingInput);
        assert_eq!(err.to_string(), "validation error: missing-input");
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            ValidationError::LevelsOutOfRange(7).code(),
            "levels-out-of-range"
        );
    }

    #[test]
    fn provider_error_carries_status_and_body() {
        let err = AppError::Provider {
            status: 429,
            body: "slow down".into(),
        };
        assert_eq!(err.to_string(), "provider request failed: 429 - slow down");
        assert_eq!(err.status_code(), 502);
    }
}
