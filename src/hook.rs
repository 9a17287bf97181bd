//! Hook registry for circuit and retry events.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::state::State;

type HookFn = Arc<dyn Fn() + Send + Sync + 'static>;
type RetryHookFn = Arc<dyn Fn(u32, Duration) + Send + Sync + 'static>;

/// A registry for event hooks.
///
/// Hooks run synchronously on the calling task, after the circuit lock
/// has been released, so they may inspect the breaker freely.
#[derive(Default)]
pub struct HookRegistry {
    on_open: RwLock<Option<HookFn>>,
    on_close: RwLock<Option<HookFn>>,
    on_half_open: RwLock<Option<HookFn>>,
    on_success: RwLock<Option<HookFn>>,
    on_failure: RwLock<Option<HookFn>>,
    on_rejected: RwLock<Option<HookFn>>,
    on_retry: RwLock<Option<RetryHookFn>>,
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook to call when the circuit opens.
    pub fn set_on_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_open.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when the circuit closes.
    pub fn set_on_close<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_close.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when the circuit half-opens.
    pub fn set_on_half_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_half_open.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when an attempt succeeds.
    pub fn set_on_success<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_success.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when an attempt fails.
    pub fn set_on_failure<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_failure.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when a call is rejected by an open circuit.
    pub fn set_on_rejected<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_rejected.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when a retry is scheduled. Receives the
    /// failed attempt and the delay before the next one.
    pub fn set_on_retry<F>(&self, f: F)
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        *self.on_retry.write() = Some(Arc::new(f));
    }

    /// Executes the appropriate hook for a state transition.
    pub fn execute_state_transition_hook(&self, to: State) {
        let slot = match to {
            State::Open => &self.on_open,
            State::Closed => &self.on_close,
            State::HalfOpen => &self.on_half_open,
        };
        Self::fire(slot);
    }

    /// Executes the success hook.
    pub fn execute_success_hook(&self) {
        Self::fire(&self.on_success);
    }

    /// Executes the failure hook.
    pub fn execute_failure_hook(&self) {
        Self::fire(&self.on_failure);
    }

    /// Executes the rejection hook.
    pub fn execute_rejected_hook(&self) {
        Self::fire(&self.on_rejected);
    }

    /// Executes the retry hook.
    pub fn execute_retry_hook(&self, attempt: u32, delay: Duration) {
        let hook = self.on_retry.read().clone();
        if let Some(hook) = hook {
            hook(attempt, delay);
        }
    }

    // Clone the hook out so it never runs under the read lock.
    fn fire(slot: &RwLock<Option<HookFn>>) {
        let hook = slot.read().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn fires_registered_hooks_only() {
        let hooks = HookRegistry::new();
        let opened = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&opened);
        hooks.set_on_open(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hooks.execute_state_transition_hook(State::Open);
        hooks.execute_state_transition_hook(State::Closed);
        hooks.execute_success_hook();

        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hook_may_replace_itself() {
        let hooks = Arc::new(HookRegistry::new());
        let inner = Arc::clone(&hooks);
        hooks.set_on_failure(move || inner.set_on_failure(|| {}));

        hooks.execute_failure_hook();
        hooks.execute_failure_hook();
    }

    #[test]
    fn retry_hook_sees_attempt_and_delay() {
        let hooks = HookRegistry::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hooks.set_on_retry(move |attempt, delay| sink.lock().push((attempt, delay)));

        hooks.execute_retry_hook(1, Duration::from_millis(200));

        assert_eq!(*seen.lock(), vec![(1, Duration::from_millis(200))]);
    }
}
