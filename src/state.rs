//! Circuit states and the transition bookkeeping behind them.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Circuit is closed and calls pass through.
    Closed,

    /// Circuit is open and calls are rejected without being attempted.
    Open,

    /// Cooldown elapsed; a single probe call is allowed to test recovery.
    HalfOpen,
}

impl State {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change, returned from the locked section so that hooks,
/// metrics and logging can run after the lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: State,
    pub(crate) to: State,
}

/// Result of asking the circuit for permission to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Rejected,
    Pass,
    /// Admitted as the half-open trial holding the slot of the given
    /// generation; the slot must be settled or released.
    Trial(u64),
}

impl Admission {
    pub(crate) fn is_allowed(self) -> bool {
        self != Admission::Rejected
    }
}

/// Who an outcome or slot release comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reporter {
    /// A caller of the public breaker API, trusted to hold the slot.
    Manual,
    /// A call admitted while the circuit was closed.
    Passed,
    /// A call admitted as the trial of the given slot generation.
    Trial(u64),
}

/// Mutable circuit state. Only ever touched under the breaker's mutex.
#[derive(Debug)]
pub(crate) struct Circuit {
    state: State,
    failures: u32,
    deadline: Option<Instant>,
    /// Generation of the slot currently held, if any.
    trial: Option<u64>,
    generation: u64,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Closed,
            failures: 0,
            deadline: None,
            trial: None,
            generation: 0,
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn failures(&self) -> u32 {
        self.failures
    }

    pub(crate) fn retry_after(&self, now: Instant) -> Option<Duration> {
        match (self.state, self.deadline) {
            (State::Open, Some(deadline)) => Some(deadline.saturating_duration_since(now)),
            _ => None,
        }
    }

    /// Decides whether a call may proceed. In HALF_OPEN the single trial
    /// slot goes to the caller that gets [`Admission::Trial`].
    pub(crate) fn allow(&mut self, now: Instant) -> (Admission, Option<Transition>) {
        match self.state {
            State::Closed => (Admission::Pass, None),
            State::Open => match self.deadline {
                Some(deadline) if now < deadline => (Admission::Rejected, None),
                _ => {
                    let slot = self.take_slot();
                    (Admission::Trial(slot), self.move_to(State::HalfOpen))
                }
            },
            State::HalfOpen if self.trial.is_some() => (Admission::Rejected, None),
            State::HalfOpen => (Admission::Trial(self.take_slot()), None),
        }
    }

    /// In HALF_OPEN only the slot holder's outcome moves the circuit;
    /// anyone else's only touches the counter.
    pub(crate) fn on_success(&mut self, reporter: Reporter) -> Option<Transition> {
        self.failures = 0;
        match self.state {
            State::HalfOpen if self.holds_slot(reporter) => {
                self.trial = None;
                self.deadline = None;
                self.move_to(State::Closed)
            }
            State::Closed | State::Open | State::HalfOpen => None,
        }
    }

    pub(crate) fn on_failure(
        &mut self,
        reporter: Reporter,
        now: Instant,
        threshold: u32,
        cooldown: Duration,
    ) -> Option<Transition> {
        self.failures = self.failures.saturating_add(1);
        match self.state {
            State::HalfOpen if self.holds_slot(reporter) => {
                self.trial = None;
                self.open_until(now, cooldown)
            }
            State::Closed if self.failures >= threshold => self.open_until(now, cooldown),
            State::Closed | State::Open | State::HalfOpen => None,
        }
    }

    /// Frees the trial slot if `reporter` still holds it.
    pub(crate) fn release(&mut self, reporter: Reporter) {
        if self.state == State::HalfOpen && self.holds_slot(reporter) {
            self.trial = None;
        }
    }

    pub(crate) fn force_open(&mut self, now: Instant, cooldown: Duration) -> Option<Transition> {
        if self.state == State::Open {
            return None;
        }
        self.trial = None;
        self.open_until(now, cooldown)
    }

    pub(crate) fn reset(&mut self) -> Option<Transition> {
        self.failures = 0;
        self.deadline = None;
        self.trial = None;
        self.move_to(State::Closed)
    }

    fn holds_slot(&self, reporter: Reporter) -> bool {
        match reporter {
            Reporter::Manual => true,
            Reporter::Passed => false,
            Reporter::Trial(slot) => self.trial == Some(slot),
        }
    }

    /// Hands out a slot under a generation no earlier slot used.
    fn take_slot(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.trial = Some(self.generation);
        self.generation
    }

    fn open_until(&mut self, now: Instant, cooldown: Duration) -> Option<Transition> {
        self.deadline = Some(now + cooldown);
        self.move_to(State::Open)
    }

    fn move_to(&mut self, to: State) -> Option<Transition> {
        let from = self.state;
        self.state = to;
        (from != to).then_some(Transition { from, to })
    }
}
