//! Circuit breaking and retry composed behind a single call.

use std::future::Future;
use std::marker::PhantomData;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{AbortRegistration, Abortable};
use tracing::debug;

use crate::breaker::CircuitBreaker;
use crate::config::ResilienceBuilder;
use crate::error::{ResilienceError, ResilienceResult};
use crate::hook::HookRegistry;
use crate::metrics::MetricSink;
use crate::outcome::CallOutcome;
use crate::policy::{RetryAll, RetryClassifier};
use crate::retry::{RetryExecutor, RetryOutcome};
use crate::state::{Admission, Reporter, State};

/// Protects one dependency with a circuit breaker and retries.
///
/// Create one per dependency and share it by cloning; clones use the same
/// circuit.
pub struct ResilientCall<E, C = RetryAll> {
    breaker: CircuitBreaker,
    executor: RetryExecutor,
    classifier: Arc<C>,
    metric_sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
    _error_type: PhantomData<fn() -> E>,
}

impl<E> ResilientCall<E>
where
    E: std::error::Error + 'static,
{
    /// Creates a new builder for customizing a resilient call.
    pub fn builder() -> ResilienceBuilder<E> {
        ResilienceBuilder::new()
    }
}

impl<E, C> ResilientCall<E, C>
where
    E: std::error::Error + 'static,
    C: RetryClassifier<E>,
{
    pub(crate) fn new(
        breaker: CircuitBreaker,
        executor: RetryExecutor,
        classifier: C,
        metric_sink: Arc<dyn MetricSink>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        Self {
            breaker,
            executor,
            classifier: Arc::new(classifier),
            metric_sink,
            hooks,
            _error_type: PhantomData,
        }
    }

    /// The circuit breaker guarding this call.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The retry executor used for admitted calls.
    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Gets the current circuit state.
    pub fn current_state(&self) -> State {
        self.breaker.state()
    }

    /// Forces the circuit closed and clears the failure counter.
    pub fn reset(&self) {
        self.breaker.reset();
    }

    /// Runs `operation` under the circuit breaker, retrying retryable
    /// failures with backoff.
    ///
    /// Fails with [`ResilienceError::Open`] without invoking `operation`
    /// when the circuit rejects the call. Every attempt's outcome is
    /// reported to the circuit in order. No further attempt starts once the
    /// circuit is anything but closed, whether a failure of this call left
    /// it so or something else tripped it during the backoff wait.
    ///
    /// Dropping the returned future cancels the call. The attempt in
    /// flight is then counted as neither success nor failure.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let reporter = match self.breaker.admit() {
            Admission::Rejected => {
                return Err(ResilienceError::Open {
                    retry_after: self.breaker.retry_after(),
                })
            }
            Admission::Pass => Reporter::Passed,
            Admission::Trial(slot) => Reporter::Trial(slot),
        };

        let slot = SlotGuard::new(&self.breaker, reporter);
        let RetryOutcome { outcome, attempts } = self
            .executor
            .run_guarded(
                |_| operation(),
                &*self.classifier,
                |report| {
                    self.metric_sink
                        .record_attempt(report.outcome.is_success(), report.elapsed);
                    slot.settle();

                    if report.outcome.is_success() {
                        self.breaker.record_success(reporter);
                        return ControlFlow::Continue(());
                    }

                    if self.breaker.record_failure(reporter) != State::Closed {
                        return ControlFlow::Break(());
                    }
                    let next = report.attempt + 1;
                    if matches!(report.outcome, CallOutcome::Retryable(_))
                        && next < self.executor.max_attempts()
                    {
                        let delay = self.executor.backoff().delay(report.attempt);
                        self.metric_sink.record_retry(report.attempt, delay);
                        self.hooks.execute_retry_hook(report.attempt, delay);
                    }
                    ControlFlow::Continue(())
                },
                |next| match self.breaker.state() {
                    State::Closed => ControlFlow::Continue(()),
                    state => {
                        debug!(
                            breaker = %self.breaker.name(),
                            attempt = next,
                            %state,
                            "circuit left closed during backoff, not retrying"
                        );
                        ControlFlow::Break(())
                    }
                },
            )
            .await;

        match outcome {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Fatal(err) => {
                debug!(breaker = %self.breaker.name(), error = %err, "fatal failure, not retried");
                Err(ResilienceError::Fatal(err))
            }
            CallOutcome::Retryable(err) => {
                debug!(
                    breaker = %self.breaker.name(),
                    attempts,
                    error = %err,
                    "giving up after retryable failures"
                );
                Err(ResilienceError::Exhausted {
                    attempts,
                    source: err,
                })
            }
        }
    }

    /// Like [`execute`](Self::execute), but can be cancelled through the
    /// `AbortHandle` paired with `registration`. A cancelled call returns
    /// [`ResilienceError::Cancelled`].
    pub async fn execute_abortable<F, Fut, T>(
        &self,
        operation: F,
        registration: AbortRegistration,
    ) -> ResilienceResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match Abortable::new(self.execute(operation), registration).await {
            Ok(result) => result,
            Err(_aborted) => {
                debug!(breaker = %self.breaker.name(), "call cancelled");
                Err(ResilienceError::Cancelled)
            }
        }
    }
}

impl<E, C> Clone for ResilientCall<E, C> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
            executor: self.executor.clone(),
            classifier: Arc::clone(&self.classifier),
            metric_sink: Arc::clone(&self.metric_sink),
            hooks: Arc::clone(&self.hooks),
            _error_type: PhantomData,
        }
    }
}

impl<E, C> std::fmt::Debug for ResilientCall<E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientCall")
            .field("breaker", &self.breaker)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

/// Holds the half-open trial slot for one call. If the call ends before
/// any outcome was reported, the slot is released untouched, and only if
/// this call still owns it.
struct SlotGuard<'a> {
    breaker: &'a CircuitBreaker,
    reporter: Reporter,
    armed: AtomicBool,
}

impl<'a> SlotGuard<'a> {
    fn new(breaker: &'a CircuitBreaker, reporter: Reporter) -> Self {
        Self {
            breaker,
            reporter,
            armed: AtomicBool::new(matches!(reporter, Reporter::Trial(_))),
        }
    }

    fn settle(&self) {
        self.armed.store(false, Ordering::Release);
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed.load(Ordering::Acquire) {
            debug!(breaker = %self.breaker.name(), "trial call abandoned, releasing slot");
            self.breaker.release(self.reporter);
        }
    }
}
