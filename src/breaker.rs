//! Core circuit breaker implementation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};
use crate::state::{Admission, Circuit, Reporter, State, Transition};

/// Inner state of the circuit breaker, shared between clones.
struct BreakerInner {
    name: Arc<str>,
    circuit: Mutex<Circuit>,
    threshold: u32,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    metric_sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
}

/// Consecutive-failure circuit breaker.
///
/// Cloning is cheap and every clone observes and mutates the same
/// circuit. All mutations are serialized by one mutex that is never held
/// while hooks, metrics or logging run.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("failures", &self.failure_count())
            .field("threshold", &self.inner.threshold)
            .field("cooldown", &self.inner.cooldown)
            .finish()
    }
}

impl CircuitBreaker {
    /// Creates a breaker with the Tokio clock and no hooks or metrics.
    ///
    /// A `threshold` of 0 behaves like 1.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self::with_parts(
            "default",
            threshold,
            cooldown,
            Arc::new(TokioClock),
            Arc::new(NullMetricSink),
            Arc::new(HookRegistry::new()),
        )
    }

    pub(crate) fn with_parts(
        name: impl Into<Arc<str>>,
        threshold: u32,
        cooldown: Duration,
        clock: Arc<dyn Clock>,
        metric_sink: Arc<dyn MetricSink>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        let inner = BreakerInner {
            name: name.into(),
            circuit: Mutex::new(Circuit::new()),
            threshold: threshold.max(1),
            cooldown,
            clock,
            metric_sink,
            hooks,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Name used in log events.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Gets the current state.
    pub fn state(&self) -> State {
        self.inner.circuit.lock().state()
    }

    /// Consecutive failures since the last success.
    pub fn failure_count(&self) -> u32 {
        self.inner.circuit.lock().failures()
    }

    /// Consecutive failures that trip the circuit.
    pub fn threshold(&self) -> u32 {
        self.inner.threshold
    }

    /// How long the circuit stays open before admitting a probe.
    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }

    /// Time left until a probe is admitted. `None` unless the circuit is open.
    pub fn retry_after(&self) -> Option<Duration> {
        let now = self.inner.clock.now();
        self.inner.circuit.lock().retry_after(now)
    }

    /// Returns true if a call may proceed now.
    ///
    /// When the cooldown has elapsed this moves the circuit to half-open
    /// and hands the single probe slot to the caller, who must then report
    /// [`on_success`](Self::on_success), [`on_failure`](Self::on_failure)
    /// or [`release_probe`](Self::release_probe).
    pub fn allow(&self) -> bool {
        self.admit().is_allowed()
    }

    pub(crate) fn admit(&self) -> Admission {
        let now = self.inner.clock.now();
        let (admission, transition) = self.inner.circuit.lock().allow(now);

        if let Some(transition) = transition {
            self.announce(transition);
        }
        if admission == Admission::Rejected {
            debug!(breaker = %self.inner.name, "call rejected, circuit open");
            self.inner.metric_sink.record_rejection();
            self.inner.hooks.execute_rejected_hook();
        }

        admission
    }

    /// Records a successful attempt.
    pub fn on_success(&self) {
        self.record_success(Reporter::Manual);
    }

    /// Records a failed attempt and returns the state it left the circuit in.
    pub fn on_failure(&self) -> State {
        self.record_failure(Reporter::Manual)
    }

    /// Frees the half-open probe slot without recording an outcome.
    pub fn release_probe(&self) {
        self.release(Reporter::Manual);
    }

    pub(crate) fn record_success(&self, reporter: Reporter) {
        let transition = self.inner.circuit.lock().on_success(reporter);

        self.inner.hooks.execute_success_hook();
        if let Some(transition) = transition {
            self.announce(transition);
        }
    }

    /// The returned state is read under the same lock that recorded the
    /// failure.
    pub(crate) fn record_failure(&self, reporter: Reporter) -> State {
        let now = self.inner.clock.now();
        let (transition, failures, state) = {
            let mut circuit = self.inner.circuit.lock();
            let transition =
                circuit.on_failure(reporter, now, self.inner.threshold, self.inner.cooldown);
            (transition, circuit.failures(), circuit.state())
        };

        debug!(breaker = %self.inner.name, failures, "attempt failed");
        self.inner.hooks.execute_failure_hook();
        if let Some(transition) = transition {
            self.announce(transition);
        }
        state
    }

    pub(crate) fn release(&self, reporter: Reporter) {
        self.inner.circuit.lock().release(reporter);
    }

    /// Forces the circuit open with a fresh cooldown.
    /// Returns false if it was already open.
    pub fn force_open(&self) -> bool {
        let now = self.inner.clock.now();
        let transition = self.inner.circuit.lock().force_open(now, self.inner.cooldown);

        match transition {
            Some(transition) => {
                self.announce(transition);
                true
            }
            None => false,
        }
    }

    /// Forces the circuit closed and clears the failure counter.
    pub fn reset(&self) {
        let transition = self.inner.circuit.lock().reset();

        if let Some(transition) = transition {
            self.announce(transition);
        }
    }

    fn announce(&self, Transition { from, to }: Transition) {
        let name = &self.inner.name;
        match to {
            State::Open => warn!(
                breaker = %name,
                %from,
                cooldown = ?self.inner.cooldown,
                "circuit opened"
            ),
            State::HalfOpen => info!(breaker = %name, "circuit half-open, probing"),
            State::Closed => info!(breaker = %name, %from, "circuit closed"),
        }

        self.inner.hooks.execute_state_transition_hook(to);
        self.inner.metric_sink.record_state_transition(from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn rejects_until_cooldown_elapses() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(5));

        assert_eq!(breaker.on_failure(), State::Closed);
        assert!(breaker.allow());
        assert_eq!(breaker.on_failure(), State::Open);

        assert!(!breaker.allow());
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!breaker.allow());
        assert_eq!(breaker.retry_after(), Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(breaker.allow());
        assert_eq!(breaker.state(), State::HalfOpen);
        assert!(!breaker.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_success_closes() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(1));
        breaker.on_failure();
        tokio::time::advance(Duration::from_secs(1)).await;

        assert!(breaker.allow());
        breaker.on_success();

        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert!(breaker.allow());
        assert!(breaker.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_restarts_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        breaker.on_failure();
        tokio::time::advance(Duration::from_secs(12)).await;

        assert!(breaker.allow());
        breaker.on_failure();

        assert_eq!(breaker.state(), State::Open);
        assert_eq!(breaker.retry_after(), Some(Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!breaker.allow());
    }

    #[test]
    fn zero_threshold_behaves_like_one() {
        let breaker = CircuitBreaker::new(0, Duration::from_secs(1));
        assert_eq!(breaker.threshold(), 1);
        breaker.on_failure();
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn manual_control() {
        let hooks = Arc::new(HookRegistry::new());
        let transitions = Arc::new(AtomicU32::new(0));
        let opened = Arc::clone(&transitions);
        hooks.set_on_open(move || {
            opened.fetch_add(1, Ordering::SeqCst);
        });
        let breaker = CircuitBreaker::with_parts(
            "manual",
            5,
            Duration::from_secs(30),
            Arc::new(TokioClock),
            Arc::new(NullMetricSink),
            hooks,
        );

        assert!(breaker.force_open());
        assert!(!breaker.force_open());
        assert!(!breaker.allow());
        assert_eq!(transitions.load(Ordering::SeqCst), 1);

        breaker.reset();
        assert_eq!(breaker.state(), State::Closed);
        assert!(breaker.allow());
    }
}
