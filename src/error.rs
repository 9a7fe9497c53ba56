use crate::models::FailureKind;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the payment engine.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Idempotency key reused with a different request payload. Never
    /// resolved as a cache miss; the caller must reject the submission.
    #[error("idempotency conflict for key '{key}': {message}")]
    IdempotencyConflict { key: String, message: String },

    #[error("gateway '{0}' is not registered")]
    GatewayNotFound(String),

    #[error("circuit breaker for '{0}' is open")]
    CircuitOpen(String),

    #[error("payment failed ({kind}): {message}")]
    PaymentFailed { kind: FailureKind, message: String },

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Returns true if this error represents an idempotency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::IdempotencyConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
