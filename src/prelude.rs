//! Re-exports the types needed to wrap a call.
//!
//! # Example
//! ```rust,no_run
//! use resilience_rs::prelude::*;
//! ```

pub use crate::{
    Backoff, CallOutcome, CircuitBreaker, FailureKind, ResilienceBuilder, ResilienceError,
    ResilienceResult, ResilientCall, RetryClassifier, State,
};
