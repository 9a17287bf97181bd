//! Advanced Example
//!
//! This example demonstrates:
//! 1. Hooks for monitoring circuit and retry events
//! 2. The health-probe preset sharing the same breaker component
//! 3. Cancelling an in-flight call
//! 4. Distinguishing an open circuit from a failed dependency

use futures::future::AbortHandle;
use resilience_rs::{
    FailureKind, HookRegistry, ResilienceBuilder, ResilienceError, ResilientCall, ServiceError,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

async fn ping(healthy: bool) -> Result<(), ServiceError> {
    if healthy {
        Ok(())
    } else {
        Err(ServiceError::with_status("health endpoint timed out", 504))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    println!("=== Advanced Resilience Example ===\n");

    // 1. Hooks for observability
    let hooks = HookRegistry::new();
    hooks.set_on_open(|| println!("Circuit OPENED due to too many failures"));
    hooks.set_on_close(|| println!("Circuit CLOSED after successful recovery"));
    hooks.set_on_half_open(|| println!("Circuit HALF-OPEN, probing the dependency"));
    hooks.set_on_retry(|attempt, delay| {
        println!("Attempt {} failed, retrying in {:?}", attempt, delay)
    });

    // 2. Health probing with the same breaker, different configuration
    let health = ResilienceBuilder::<ServiceError>::health_probe()
        .threshold(2)
        .cooldown(Duration::from_millis(500))
        .hooks(hooks)
        .build()
        .expect("valid configuration");

    for round in 1..=6 {
        let healthy = round >= 5;
        match health.execute(|| ping(healthy)).await {
            Ok(()) => println!("Health check {}: ok", round),
            Err(ResilienceError::Open { .. }) => {
                println!("Health check {}: skipped, circuit open", round);
                tokio::time::sleep(Duration::from_millis(600)).await;
            }
            Err(err) => println!("Health check {}: {}", round, err),
        }
    }

    // 3. Cancelling a slow call
    let orders = ResilientCall::<ServiceError>::builder()
        .name("orders")
        .base_delay(Duration::from_secs(5))
        .classifier(|err: &ServiceError| {
            if err.status == 400 {
                FailureKind::Fatal
            } else {
                FailureKind::Retryable
            }
        })
        .build()
        .expect("valid configuration");

    let attempts = AtomicU32::new(0);
    let (handle, registration) = AbortHandle::new_pair();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();
    });

    let result = orders
        .execute_abortable(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ServiceError::new("orders backend overloaded")) }
            },
            registration,
        )
        .await;
    let _ = canceller.await;

    // 4. Handling the different outcomes
    match result {
        Err(ResilienceError::Cancelled) => println!(
            "\nOrders call cancelled after {} attempt(s); failures recorded: {}",
            attempts.load(Ordering::SeqCst),
            orders.breaker().failure_count()
        ),
        Err(ResilienceError::Open { .. }) => println!("\nOrders circuit open"),
        Err(err) => println!("\nOrders call failed: {}", err),
        Ok(()) => println!("\nOrders call succeeded"),
    }

    println!("\n=== Example Completed ===");
}
