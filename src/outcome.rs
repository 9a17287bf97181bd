//! Classified outcomes of a single attempt.

/// Whether a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient failure; another attempt may succeed.
    Retryable,
    /// Permanent failure, such as malformed input; retrying is pointless.
    Fatal,
}

/// Outcome of one attempt, or of a whole retried call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T, E> {
    /// The operation produced a value.
    Success(T),
    /// The operation failed and may be retried.
    Retryable(E),
    /// The operation failed and must not be retried.
    Fatal(E),
}

impl<T, E> CallOutcome<T, E> {
    /// Builds an outcome from an operation result and a failure kind.
    pub fn classify(result: Result<T, E>, kind: impl FnOnce(&E) -> FailureKind) -> Self {
        match result {
            Ok(value) => CallOutcome::Success(value),
            Err(err) => match kind(&err) {
                FailureKind::Retryable => CallOutcome::Retryable(err),
                FailureKind::Fatal => CallOutcome::Fatal(err),
            },
        }
    }

    /// Returns true for [`CallOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    /// Converts into a plain `Result`, dropping the failure kind.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Retryable(err) | CallOutcome::Fatal(err) => Err(err),
        }
    }
}
