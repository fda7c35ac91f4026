//! Coordination store error types.

use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Coordination store errors.
///
/// Errors are cloneable so the health monitor can keep the last one around
/// and hand copies to callers that fail fast.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (refused, dropped, I/O).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A store call did not complete within its time bound.
    #[error("Store operation timed out")]
    Timeout,

    /// The store answered but rejected the command.
    #[error("Command error: {0}")]
    Command(String),

    /// Pool error.
    #[error("Pool error: {0}")]
    Pool(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Create an unavailable error.
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a command error.
    pub fn command<S: Into<String>>(msg: S) -> Self {
        Self::Command(msg.into())
    }

    /// Check if this error indicates the store is unreachable rather than a
    /// rejected command.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout | Self::Pool(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Command(err.to_string())
        }
    }
}

impl<E> From<bb8::RunError<E>> for StoreError
where
    E: std::error::Error + 'static,
{
    fn from(err: bb8::RunError<E>) -> Self {
        match err {
            bb8::RunError::TimedOut => Self::Timeout,
            bb8::RunError::User(e) => Self::Pool(e.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for StoreError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout
    }
}
