//! Error types for the resilience pipeline.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Main error type for the resilience pipeline.
///
/// This enum covers the failure modes an operation can surface through the
/// pipeline, with enough context for retry and circuit-breaker decisions.
#[derive(Error, Debug, Clone)]
pub enum ResilienceError {
    /// Network error (connection reset, DNS failure, broken pipe)
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Timeout error (the operation exceeded its deadline)
    #[error("Timeout: {message}")]
    Timeout {
        /// Error message describing what timed out
        message: String,
    },

    /// Server error (5xx-style responses from the remote service)
    #[error("Server error: {message}")]
    Server {
        /// Error message from the server
        message: String,
        /// Status code reported by the server, if any
        status_code: Option<u16>,
    },

    /// Rate limit exceeded without waiting (non-blocking acquisition only)
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Error message describing the rate limit state
        message: String,
        /// Duration until capacity is expected to be available
        retry_after: Option<Duration>,
    },

    /// Validation error (malformed request, constraint violated)
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the validation failure
        message: String,
    },

    /// Authentication error (rejected credentials)
    #[error("Authentication error: {message}")]
    Authentication {
        /// Error message describing the authentication failure
        message: String,
    },

    /// The circuit breaker rejected the call without attempting it
    #[error("Circuit breaker is open")]
    CircuitOpen {
        /// Duration until the breaker will allow a probing call
        retry_after: Option<Duration>,
    },

    /// The caller's operation was cancelled while suspended
    #[error("Cancelled: {message}")]
    Cancelled {
        /// Error message describing the cancellation
        message: String,
    },

    /// Internal error (unexpected conditions, library bugs)
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal issue
        message: String,
    },
}

/// Coarse error classification used by retry configuration.
///
/// Every [`ResilienceError`] maps to exactly one kind; retry policies are
/// expressed as a set of kinds rather than by matching full variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection-level failures
    Network,
    /// Deadline expirations
    Timeout,
    /// Remote 5xx-style failures
    Server,
    /// Rate limit rejections
    RateLimit,
    /// Request validation failures
    Validation,
    /// Credential rejections
    Authentication,
    /// Fail-fast breaker rejections
    CircuitOpen,
    /// Caller-initiated cancellations
    Cancelled,
    /// Everything unexpected
    Internal,
}

impl ResilienceError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResilienceError::Network { .. } => ErrorKind::Network,
            ResilienceError::Timeout { .. } => ErrorKind::Timeout,
            ResilienceError::Server { .. } => ErrorKind::Server,
            ResilienceError::RateLimitExceeded { .. } => ErrorKind::RateLimit,
            ResilienceError::Validation { .. } => ErrorKind::Validation,
            ResilienceError::Authentication { .. } => ErrorKind::Authentication,
            ResilienceError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            ResilienceError::Cancelled { .. } => ErrorKind::Cancelled,
            ResilienceError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns true if this error is transient and eligible for retry.
    ///
    /// Transient errors include:
    /// - Network errors (connection issues)
    /// - Timeouts
    /// - Server errors with a 500, 503 or 529 status code
    /// - Rate limit rejections
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResilienceError::Network { .. }
                | ResilienceError::Timeout { .. }
                | ResilienceError::RateLimitExceeded { .. }
                | ResilienceError::Server {
                    status_code: Some(500) | Some(503) | Some(529),
                    ..
                }
        )
    }

    /// Returns the retry-after duration if available.
    ///
    /// Set on rate limit rejections and on breaker rejections that know when
    /// the next probing call will be allowed.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ResilienceError::RateLimitExceeded { retry_after, .. } => *retry_after,
            ResilienceError::CircuitOpen { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        let rate_limit_error = ResilienceError::RateLimitExceeded {
            message: "Too many requests".to_string(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert!(rate_limit_error.is_retryable());

        let auth_error = ResilienceError::Authentication {
            message: "Invalid API key".to_string(),
        };
        assert!(!auth_error.is_retryable());

        let server_error = ResilienceError::Server {
            message: "Service unavailable".to_string(),
            status_code: Some(503),
        };
        assert!(server_error.is_retryable());

        let client_error = ResilienceError::Server {
            message: "Bad request".to_string(),
            status_code: Some(400),
        };
        assert!(!client_error.is_retryable());
    }

    #[test]
    fn test_circuit_open_is_not_retryable() {
        let open = ResilienceError::CircuitOpen {
            retry_after: Some(Duration::from_secs(10)),
        };
        assert!(!open.is_retryable());
        assert_eq!(open.kind(), ErrorKind::CircuitOpen);
    }

    #[test]
    fn test_retry_after() {
        let rate_limit = ResilienceError::RateLimitExceeded {
            message: "Too many requests".to_string(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(rate_limit.retry_after(), Some(Duration::from_secs(30)));

        let network_error = ResilienceError::Network {
            message: "Connection failed".to_string(),
        };
        assert_eq!(network_error.retry_after(), None);
    }

    #[test]
    fn test_kind_mapping() {
        let timeout = ResilienceError::Timeout {
            message: "deadline exceeded".to_string(),
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);

        let validation = ResilienceError::Validation {
            message: "missing field".to_string(),
        };
        assert_eq!(validation.kind(), ErrorKind::Validation);
    }
}
