//! Metric sinks receiving resilience events.

use std::time::Duration;

use crate::state::State;

/// Trait for metrics sinks that can receive circuit and retry events.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a state transition.
    fn record_state_transition(&self, from: State, to: State);

    /// Records the outcome and duration of a single attempt.
    fn record_attempt(&self, success: bool, duration: Duration);

    /// Records that a retry was scheduled after the given attempt.
    fn record_retry(&self, attempt: u32, delay: Duration);

    /// Records a call rejected by an open circuit.
    fn record_rejection(&self);
}

/// A null metrics sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _from: State, _to: State) {}
    fn record_attempt(&self, _success: bool, _duration: Duration) {}
    fn record_retry(&self, _attempt: u32, _delay: Duration) {}
    fn record_rejection(&self) {}
}

#[cfg(feature = "prometheus")]
pub use self::prometheus::PrometheusSink;

#[cfg(feature = "prometheus")]
mod prometheus {
    use std::time::Duration;

    use prometheus_client::metrics::counter::Counter;
    use prometheus_client::metrics::family::Family;
    use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
    use prometheus_client::registry::Registry;

    use super::MetricSink;
    use crate::state::State;

    type Labels = Vec<(String, String)>;

    /// Metric sink exporting counters through `prometheus-client`.
    #[derive(Debug, Clone)]
    pub struct PrometheusSink {
        transitions: Family<Labels, Counter>,
        attempts: Family<Labels, Counter>,
        attempt_duration: Histogram,
        retries: Counter,
        rejections: Counter,
    }

    impl PrometheusSink {
        /// Creates the metrics and registers them, prefixed with `prefix`.
        pub fn new(registry: &mut Registry, prefix: &str) -> Self {
            let sink = Self {
                transitions: Family::default(),
                attempts: Family::default(),
                attempt_duration: Histogram::new(exponential_buckets(0.001, 2.0, 16)),
                retries: Counter::default(),
                rejections: Counter::default(),
            };

            let registry = registry.sub_registry_with_prefix(prefix);
            registry.register(
                "state_transitions",
                "Circuit state transitions",
                sink.transitions.clone(),
            );
            registry.register(
                "attempts",
                "Attempts made against the protected dependency",
                sink.attempts.clone(),
            );
            registry.register(
                "attempt_duration_seconds",
                "Duration of individual attempts",
                sink.attempt_duration.clone(),
            );
            registry.register("retries", "Retries scheduled", sink.retries.clone());
            registry.register(
                "rejections",
                "Calls rejected by an open circuit",
                sink.rejections.clone(),
            );

            sink
        }
    }

    impl MetricSink for PrometheusSink {
        fn record_state_transition(&self, from: State, to: State) {
            self.transitions
                .get_or_create(&vec![
                    ("from".to_string(), from.as_str().to_string()),
                    ("to".to_string(), to.as_str().to_string()),
                ])
                .inc();
        }

        fn record_attempt(&self, success: bool, duration: Duration) {
            let outcome = if success { "success" } else { "failure" };
            self.attempts
                .get_or_create(&vec![("outcome".to_string(), outcome.to_string())])
                .inc();
            self.attempt_duration.observe(duration.as_secs_f64());
        }

        fn record_retry(&self, _attempt: u32, _delay: Duration) {
            self.retries.inc();
        }

        fn record_rejection(&self) {
            self.rejections.inc();
        }
    }
}
