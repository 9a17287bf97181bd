//! Time source and delay scheduling.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;

/// Provides monotonic time and non-blocking delays.
///
/// The default [`TokioClock`] follows `tokio::time`, so tests running on a
/// paused runtime control both `now` and `sleep` through
/// `tokio::time::advance`.
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Completes after `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Clock backed by the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }
}
