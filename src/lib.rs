//! # resilience-rs
//!
//! Circuit breaking and retry with exponential backoff for fallible
//! asynchronous operations.
//!
//! A [`ResilientCall`] guards one dependency (a downstream service, a
//! cache, a health endpoint). Each call first asks its [`CircuitBreaker`]
//! for permission, then runs the operation through a [`RetryExecutor`],
//! reporting every attempt back to the circuit.
//!
//! ## Circuit states
//!
//! - **Closed**: calls pass through. Consecutive failures are counted and
//!   reaching the threshold opens the circuit.
//! - **Open**: calls fail fast with [`ResilienceError::Open`] until the
//!   cooldown elapses.
//! - **Half-Open**: exactly one probe call is admitted. Success closes the
//!   circuit, failure reopens it for another cooldown.
//!
//! ## Retries
//!
//! Failed attempts are classified by a [`RetryClassifier`]. Retryable
//! failures are retried after `base * 2^attempt` (capped) up to
//! `max_attempts`; fatal failures end the call immediately. Both count
//! against the circuit.
//!
//! ## Basic Usage
//!
//! ```rust
//! use resilience_rs::{ResilienceError, ResilientCall, ServiceError, StatusClassifier};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let call = ResilientCall::<ServiceError>::builder()
//!     .name("orders")
//!     .threshold(5)
//!     .cooldown(Duration::from_secs(30))
//!     .base_delay(Duration::from_millis(100))
//!     .max_attempts(3)
//!     .classifier(StatusClassifier)
//!     .build()
//!     .expect("valid configuration");
//!
//! match call.execute(|| async { Ok::<_, ServiceError>("order #1") }).await {
//!     Ok(order) => println!("fetched {}", order),
//!     Err(ResilienceError::Open { retry_after }) => {
//!         println!("orders unavailable, retry after {:?}", retry_after)
//!     }
//!     Err(err) => println!("orders failed: {}", err),
//! }
//! # }
//! ```
//!
//! ## Features
//!
//! - `prometheus` - export events through `prometheus-client`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod backoff;
mod breaker;
mod clock;
mod config;
mod error;
mod hook;
mod metrics;
mod outcome;
mod policy;
pub mod prelude;
mod resilient;
mod retry;
mod state;

// Re-exports
pub use backoff::Backoff;
pub use breaker::CircuitBreaker;
pub use clock::{Clock, TokioClock};
pub use config::ResilienceBuilder;
pub use error::{ConfigError, ResilienceError, ResilienceResult, ServiceError};
pub use hook::HookRegistry;
#[cfg(feature = "prometheus")]
pub use metrics::PrometheusSink;
pub use metrics::{MetricSink, NullMetricSink};
pub use outcome::{CallOutcome, FailureKind};
pub use policy::{RetryAll, RetryClassifier, RetryNone, StatusClassifier};
pub use resilient::ResilientCall;
pub use retry::{AttemptReport, RetryExecutor, RetryOutcome};
pub use state::State;
