use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinTwinError {
    #[error("Invalid input: {field} ({reason})")]
    InvalidInput { field: String, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Sampling failure: {context}")]
    SamplingFailure { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl FinTwinError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        FinTwinError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for FinTwinError {
    fn from(e: serde_json::Error) -> Self {
        FinTwinError::SerializationError(e.to_string())
    }
}
