//! Configuration for resilient calls.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::breaker::CircuitBreaker;
use crate::clock::{Clock, TokioClock};
use crate::error::ConfigError;
use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};
use crate::policy::{RetryAll, RetryClassifier};
use crate::resilient::ResilientCall;
use crate::retry::RetryExecutor;

/// Builder for [`ResilientCall`].
///
/// Defaults: threshold 5, cooldown 30 s, base delay 100 ms, max delay
/// 10 s, 3 attempts, every error retryable.
pub struct ResilienceBuilder<E, C = RetryAll> {
    name: String,
    threshold: u32,
    cooldown: Duration,
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
    classifier: C,
    clock: Arc<dyn Clock>,
    metric_sink: Arc<dyn MetricSink>,
    hook_registry: Arc<HookRegistry>,
    _error_type: PhantomData<fn() -> E>,
}

impl<E> Default for ResilienceBuilder<E>
where
    E: std::error::Error + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ResilienceBuilder<E>
where
    E: std::error::Error + 'static,
{
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            name: "default".to_string(),
            threshold: 5,
            cooldown: Duration::from_secs(30),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
            classifier: RetryAll,
            clock: Arc::new(TokioClock),
            metric_sink: Arc::new(NullMetricSink),
            hook_registry: Arc::new(HookRegistry::new()),
            _error_type: PhantomData,
        }
    }

    /// Preset for protecting a downstream dependency. Same as [`new`](Self::new).
    pub fn dependency() -> Self {
        Self::new()
    }

    /// Preset for health probing: one attempt per check, trips after 5
    /// consecutive failed checks and re-probes after 10 seconds.
    pub fn health_probe() -> Self {
        Self::new()
            .name("health")
            .max_attempts(1)
            .cooldown(Duration::from_secs(10))
    }
}

impl<E, C> ResilienceBuilder<E, C>
where
    E: std::error::Error + 'static,
{
    /// Sets the name used in log events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of consecutive failures that trips the circuit.
    pub fn threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open before admitting a probe.
    pub fn cooldown(mut self, duration: Duration) -> Self {
        self.cooldown = duration;
        self
    }

    /// Sets the delay after the first failed attempt.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the upper bound for backoff delays.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the maximum number of attempts per call, the first included.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the clock used for cooldowns and backoff.
    pub fn clock<K: Clock>(mut self, clock: K) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets a metric sink.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets a hook registry.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    /// Sets the policy deciding which errors are retried.
    pub fn classifier<NewC>(self, classifier: NewC) -> ResilienceBuilder<E, NewC>
    where
        NewC: RetryClassifier<E>,
    {
        ResilienceBuilder {
            name: self.name,
            threshold: self.threshold,
            cooldown: self.cooldown,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            max_attempts: self.max_attempts,
            classifier,
            clock: self.clock,
            metric_sink: self.metric_sink,
            hook_registry: self.hook_registry,
            _error_type: PhantomData,
        }
    }

    /// Builds the resilient call wrapper.
    pub fn build(self) -> Result<ResilientCall<E, C>, ConfigError>
    where
        C: RetryClassifier<E>,
    {
        if self.threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }

        let breaker = CircuitBreaker::with_parts(
            self.name,
            self.threshold,
            self.cooldown,
            Arc::clone(&self.clock),
            Arc::clone(&self.metric_sink),
            Arc::clone(&self.hook_registry),
        );
        let executor = RetryExecutor::with_clock(
            Backoff::new(self.base_delay, self.max_delay),
            self.max_attempts,
            self.clock,
        );

        Ok(ResilientCall::new(
            breaker,
            executor,
            self.classifier,
            self.metric_sink,
            self.hook_registry,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::policy::StatusClassifier;

    #[test]
    fn defaults() {
        let call = ResilienceBuilder::<ServiceError>::new().build().unwrap();

        assert_eq!(call.breaker().threshold(), 5);
        assert_eq!(call.breaker().cooldown(), Duration::from_secs(30));
        assert_eq!(call.executor().max_attempts(), 3);
        assert_eq!(call.executor().backoff().base(), Duration::from_millis(100));
    }

    #[test]
    fn rejects_zero_threshold_and_attempts() {
        let err = ResilienceBuilder::<ServiceError>::new()
            .threshold(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroThreshold);

        let err = ResilienceBuilder::<ServiceError>::new()
            .max_attempts(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroAttempts);
    }

    #[test]
    fn health_probe_preset_is_single_attempt() {
        let call = ResilienceBuilder::<ServiceError>::health_probe()
            .classifier(StatusClassifier)
            .build()
            .unwrap();

        assert_eq!(call.breaker().name(), "health");
        assert_eq!(call.executor().max_attempts(), 1);
        assert_eq!(call.breaker().cooldown(), Duration::from_secs(10));
    }
}
