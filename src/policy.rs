//! Policies deciding which failures are retried.

use crate::error::ServiceError;
use crate::outcome::FailureKind;

/// Classifies operation errors as retryable or fatal.
///
/// Fatal failures end a call immediately but still count against the
/// circuit, since they also say something about the dependency's health.
pub trait RetryClassifier<E>: Send + Sync + 'static {
    /// Decides whether the given error deserves another attempt.
    fn classify(&self, error: &E) -> FailureKind;
}

/// Treats every error as retryable.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryAll;

impl<E> RetryClassifier<E> for RetryAll {
    fn classify(&self, _error: &E) -> FailureKind {
        FailureKind::Retryable
    }
}

/// Treats every error as fatal, turning the executor into a single attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryNone;

impl<E> RetryClassifier<E> for RetryNone {
    fn classify(&self, _error: &E) -> FailureKind {
        FailureKind::Fatal
    }
}

/// Retries [`ServiceError`]s with transient statuses (408, 429, 5xx).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusClassifier;

impl RetryClassifier<ServiceError> for StatusClassifier {
    fn classify(&self, error: &ServiceError) -> FailureKind {
        if error.is_transient() {
            FailureKind::Retryable
        } else {
            FailureKind::Fatal
        }
    }
}

impl<E, F> RetryClassifier<E> for F
where
    F: Fn(&E) -> FailureKind + Send + Sync + 'static,
{
    fn classify(&self, error: &E) -> FailureKind {
        self(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of<C: RetryClassifier<E>, E>(classifier: &C, error: &E) -> FailureKind {
        classifier.classify(error)
    }

    #[test]
    fn status_classifier_splits_client_and_server_errors() {
        assert_eq!(
            kind_of(&StatusClassifier, &ServiceError::new("down")),
            FailureKind::Retryable
        );
        assert_eq!(
            kind_of(&StatusClassifier, &ServiceError::with_status("bad", 422)),
            FailureKind::Fatal
        );
    }

    #[test]
    fn closures_classify() {
        let classifier = |e: &String| {
            if e.starts_with("invalid") {
                FailureKind::Fatal
            } else {
                FailureKind::Retryable
            }
        };

        assert_eq!(kind_of(&classifier, &"invalid id".to_string()), FailureKind::Fatal);
        assert_eq!(kind_of(&classifier, &"timeout".to_string()), FailureKind::Retryable);
        assert_eq!(kind_of(&RetryAll, &"invalid id".to_string()), FailureKind::Retryable);
        assert_eq!(kind_of(&RetryNone, &"timeout".to_string()), FailureKind::Fatal);
    }
}
