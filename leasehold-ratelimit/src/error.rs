//! Error types for rate limiting

use leasehold_store::StoreError;
use thiserror::Error;

/// Result type for rate limiting operations
pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Rate limiting errors
///
/// A denied request is not an error: [`can_pass`](crate::RateLimiter::can_pass)
/// returns `Ok(false)` for it.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Store error (unreachable, timed out, rejected command)
    #[error("Rate limit store error: {0}")]
    StoreError(#[from] StoreError),

    /// Configuration error
    #[error("Rate limit configuration error: {0}")]
    ConfigError(String),
}

impl RateLimitError {
    /// Create a new store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::StoreError(StoreError::command(msg))
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the store could not be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreError(e) if e.is_unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error() {
        let error: RateLimitError = StoreError::unavailable("connection refused").into();
        assert!(error.is_unavailable());
        assert!(error.to_string().contains("connection refused"));

        let error = RateLimitError::store("WRONGTYPE");
        assert!(!error.is_unavailable());
    }

    #[test]
    fn test_config_error() {
        let error = RateLimitError::config("max_requests must be positive");
        assert!(!error.is_unavailable());
        assert_eq!(
            error.to_string(),
            "Rate limit configuration error: max_requests must be positive"
        );
    }
}
