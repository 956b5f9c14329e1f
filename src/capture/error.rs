use thiserror::Error;

/// Failures raised by capture operations. Every variant leaves the aggregate
/// exactly as it was before the call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl CaptureError {
    pub fn validation(message: impl Into<String>) -> Self {
        CaptureError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        CaptureError::InvalidState(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CaptureError::NotFound(message.into())
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;
