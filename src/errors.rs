use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// rate-type fields incomplete or inconsistent
    #[error("invalid configuration: {message}")]
    Configuration {
        message: String,
    },

    /// caller-supplied input out of bounds
    #[error("invalid {field}: {message}")]
    Validation {
        field: String,
        message: String,
    },

    /// closed-form solve undefined for the given inputs
    #[error("degenerate calculation: {message}")]
    ArithmeticDegenerate {
        message: String,
    },

    #[error("loan not found: {id}")]
    LoanNotFound {
        id: Uuid,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("serialization error: {message}")]
    Serialization {
        message: String,
    },
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        EngineError::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn degenerate(message: impl Into<String>) -> Self {
        EngineError::ArithmeticDegenerate {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
