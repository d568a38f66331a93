use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("malformed callback payload: {message}")]
    MalformedPayload { message: String },

    #[error("missing required callback field: {field}")]
    MissingField { field: String },

    #[error("unsupported provider: {0}")]
    UnknownProvider(String),

    #[error("gateway configuration error: {message}")]
    Configuration { message: String },
}

impl GatewayError {
    pub fn malformed(message: impl Into<String>) -> Self {
        GatewayError::MalformedPayload {
            message: message.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        GatewayError::MissingField {
            field: field.into(),
        }
    }
}
