//! Sequential retry with exponential backoff.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::backoff::Backoff;
use crate::clock::{Clock, TokioClock};
use crate::outcome::CallOutcome;
use crate::policy::RetryClassifier;

/// Final outcome of a retried call and the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T, E> {
    /// Outcome of the last attempt made.
    pub outcome: CallOutcome<T, E>,
    /// Attempts made, between 1 and the configured maximum.
    pub attempts: u32,
}

/// One finished attempt, as seen by an observer.
#[derive(Debug)]
pub struct AttemptReport<'a, T, E> {
    /// 0-based attempt number.
    pub attempt: u32,
    /// How long the attempt took.
    pub elapsed: Duration,
    /// What the attempt produced.
    pub outcome: &'a CallOutcome<T, E>,
}

/// Runs an operation until it succeeds, fails fatally, or runs out of
/// attempts, sleeping between attempts according to a [`Backoff`].
///
/// Attempts of one call are strictly sequential. There is no delay before
/// the first attempt.
#[derive(Clone)]
pub struct RetryExecutor {
    backoff: Backoff,
    max_attempts: u32,
    clock: Arc<dyn Clock>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Backoff::default(), 3)
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("backoff", &self.backoff)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl RetryExecutor {
    /// Creates an executor using the Tokio clock. A `max_attempts` of 0
    /// behaves like 1.
    pub fn new(backoff: Backoff, max_attempts: u32) -> Self {
        Self::with_clock(backoff, max_attempts, Arc::new(TokioClock))
    }

    /// Creates an executor sleeping on the given clock.
    pub fn with_clock(backoff: Backoff, max_attempts: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            backoff,
            max_attempts: max_attempts.max(1),
            clock,
        }
    }

    /// The backoff policy between attempts.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Maximum number of attempts per call.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `operation`, retrying errors the classifier marks retryable.
    ///
    /// The operation receives the 0-based attempt number.
    pub async fn run<F, Fut, T, E, C>(&self, operation: F, classifier: &C) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: RetryClassifier<E> + ?Sized,
    {
        self.run_observed(operation, classifier, |_| ControlFlow::Continue(()))
            .await
    }

    /// Like [`run`](Self::run), reporting every attempt to `observer` in
    /// completion order. Returning `ControlFlow::Break` from the observer
    /// stops further attempts; the last outcome is then returned as is.
    pub async fn run_observed<F, Fut, T, E, C, O>(
        &self,
        operation: F,
        classifier: &C,
        observer: O,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: RetryClassifier<E> + ?Sized,
        O: FnMut(AttemptReport<'_, T, E>) -> ControlFlow<()>,
    {
        self.run_guarded(operation, classifier, observer, |_| ControlFlow::Continue(()))
            .await
    }

    /// Like [`run_observed`](Self::run_observed), additionally asking
    /// `resume` after every backoff sleep whether the next attempt may
    /// start. `resume` receives the number of that attempt. On
    /// `ControlFlow::Break` the outcome of the previous attempt is returned.
    pub async fn run_guarded<F, Fut, T, E, C, O, R>(
        &self,
        mut operation: F,
        classifier: &C,
        mut observer: O,
        mut resume: R,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: RetryClassifier<E> + ?Sized,
        O: FnMut(AttemptReport<'_, T, E>) -> ControlFlow<()>,
        R: FnMut(u32) -> ControlFlow<()>,
    {
        let mut attempt = 0;
        loop {
            let started = self.clock.now();
            let result = operation(attempt).await;
            let elapsed = self.clock.now().saturating_duration_since(started);
            let outcome = CallOutcome::classify(result, |err| classifier.classify(err));

            let flow = observer(AttemptReport {
                attempt,
                elapsed,
                outcome: &outcome,
            });
            let attempts = attempt + 1;

            let retryable = matches!(outcome, CallOutcome::Retryable(_));
            if !retryable || flow.is_break() || attempts >= self.max_attempts {
                return RetryOutcome { outcome, attempts };
            }

            let delay = self.backoff.delay(attempt);
            debug!(attempt, ?delay, "attempt failed, retrying");
            self.clock.sleep(delay).await;

            if resume(attempts).is_break() {
                debug!(attempts, "retries abandoned after backoff");
                return RetryOutcome { outcome, attempts };
            }
            attempt = attempts;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::FailureKind;
    use crate::policy::{RetryAll, RetryNone};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn executor(max_attempts: u32) -> RetryExecutor {
        RetryExecutor::new(
            Backoff::new(Duration::from_millis(100), Duration::from_millis(400)),
            max_attempts,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);

        let result = executor(3)
            .run(
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 2 {
                            Err("flaky")
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                &RetryAll,
            )
            .await;

        assert_eq!(result.outcome, CallOutcome::Success(2));
        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_stops_immediately_without_waiting() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = executor(3)
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("invalid argument") }
                },
                &RetryNone,
            )
            .await;

        assert_eq!(result.outcome, CallOutcome::Fatal("invalid argument"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error_after_backoff() {
        let started = Instant::now();

        let result = executor(4)
            .run(|attempt| async move { Err::<(), _>(attempt) }, &RetryAll)
            .await;

        assert_eq!(result.outcome, CallOutcome::Retryable(3));
        assert_eq!(result.attempts, 4);
        // 100 + 200 + 400 between four attempts, none after the last.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(700), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(800), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_every_attempt_and_can_stop() {
        let mut seen = Vec::new();

        let result = executor(5)
            .run_observed(
                |attempt| async move { Err::<(), _>(attempt) },
                &|_: &u32| FailureKind::Retryable,
                |report| {
                    seen.push(report.attempt);
                    if report.attempt == 1 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            )
            .await;

        assert_eq!(seen, vec![0, 1]);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.outcome, CallOutcome::Retryable(1));
    }

    #[tokio::test(start_paused = true)]
    async fn resume_can_stop_after_the_wait() {
        let calls = AtomicU32::new(0);
        let mut asked = Vec::new();
        let started = Instant::now();

        let result = executor(5)
            .run_guarded(
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move { Err::<(), _>(attempt) }
                },
                &RetryAll,
                |_| ControlFlow::Continue(()),
                |next| {
                    asked.push(next);
                    if next == 2 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            )
            .await;

        assert_eq!(asked, vec![1, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.outcome, CallOutcome::Retryable(1));
        // Both waits were taken; the check happens after the sleep.
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
