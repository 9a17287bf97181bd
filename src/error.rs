//! Error types for resilient calls.

use std::time::Duration;

use thiserror::Error;

/// Result type for resilient calls.
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Error returned by [`ResilientCall::execute`](crate::ResilientCall::execute).
///
/// Callers can tell "the dependency is presumed unhealthy, try later"
/// ([`ResilienceError::Open`]) apart from "the dependency was called and
/// failed" ([`ResilienceError::Fatal`] and [`ResilienceError::Exhausted`]).
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit breaker is open")]
    Open {
        /// Time left until the next probe will be admitted, if known.
        retry_after: Option<Duration>,
    },

    /// The operation failed with an error that is not worth retrying.
    #[error("operation failed: {0}")]
    Fatal(#[source] E),

    /// The operation kept failing with retryable errors until no attempts
    /// were left. `source` is the error of the final attempt.
    #[error("operation failed after {attempts} attempt(s): {source}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        source: E,
    },

    /// The caller aborted the call before it completed.
    #[error("call was cancelled")]
    Cancelled,
}

impl<E> ResilienceError<E> {
    /// Returns true if the call was rejected by an open circuit.
    pub fn is_open(&self) -> bool {
        matches!(self, ResilienceError::Open { .. })
    }

    /// Returns true if the call was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResilienceError::Cancelled)
    }

    /// Borrows the underlying operation error, if any.
    pub fn inner(&self) -> Option<&E> {
        match self {
            ResilienceError::Fatal(e) | ResilienceError::Exhausted { source: e, .. } => Some(e),
            ResilienceError::Open { .. } | ResilienceError::Cancelled => None,
        }
    }

    /// Consumes the error, returning the underlying operation error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            ResilienceError::Fatal(e) | ResilienceError::Exhausted { source: e, .. } => Some(e),
            ResilienceError::Open { .. } | ResilienceError::Cancelled => None,
        }
    }
}

/// Invalid builder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The failure threshold must be at least 1.
    #[error("failure threshold must be at least 1")]
    ZeroThreshold,

    /// At least one attempt per call is required.
    #[error("max attempts must be at least 1")]
    ZeroAttempts,
}

/// An error carrying an HTTP-style status code.
///
/// Statuses follow the usual convention: 4xx are caller errors, 5xx are
/// server errors. The default status is 500.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (status {status})")]
pub struct ServiceError {
    /// Human readable description.
    pub message: String,
    /// HTTP-style status code.
    pub status: u16,
}

impl ServiceError {
    /// Creates an error with status 500.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_status(message, 500)
    }

    /// Creates an error with an explicit status.
    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// Returns true if a later attempt could plausibly succeed:
    /// request timeout (408), throttling (429) and any 5xx.
    pub fn is_transient(&self) -> bool {
        matches!(self.status, 408 | 429 | 500..=599)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn exhausted_preserves_cause() {
        let err: ResilienceError<ServiceError> = ResilienceError::Exhausted {
            attempts: 3,
            source: ServiceError::new("upstream down"),
        };

        assert_eq!(
            err.to_string(),
            "operation failed after 3 attempt(s): upstream down (status 500)"
        );
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("upstream down (status 500)".to_string())
        );
        assert_eq!(err.into_inner(), Some(ServiceError::new("upstream down")));
    }

    #[test]
    fn open_has_no_inner_error() {
        let err: ResilienceError<ServiceError> = ResilienceError::Open { retry_after: None };
        assert!(err.is_open());
        assert!(err.inner().is_none());
        assert!(err.source().is_none());
    }

    #[test]
    fn service_error_status_classes() {
        assert!(ServiceError::new("boom").is_transient());
        assert!(ServiceError::with_status("slow down", 429).is_transient());
        assert!(ServiceError::with_status("timeout", 408).is_transient());
        assert!(!ServiceError::with_status("bad input", 400).is_transient());
        assert!(!ServiceError::with_status("missing", 404).is_transient());
    }
}
