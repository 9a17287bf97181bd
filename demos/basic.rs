use resilience_rs::{ResilienceError, ResilientCall, ServiceError, StatusClassifier};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

// Fails every call from the 4th to the 9th, then recovers.
async fn fetch_inventory(calls: &AtomicU32) -> Result<String, ServiceError> {
    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
    if (4..10).contains(&n) {
        Err(ServiceError::with_status("inventory service unavailable", 503))
    } else {
        Ok(format!("inventory snapshot #{}", n))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let call = ResilientCall::<ServiceError>::builder()
        .name("inventory")
        .threshold(3)
        .cooldown(Duration::from_secs(2))
        .base_delay(Duration::from_millis(50))
        .max_delay(Duration::from_millis(200))
        .max_attempts(2)
        .classifier(StatusClassifier)
        .build()
        .expect("valid configuration");

    println!("Circuit initial state: {:?}", call.current_state());

    let calls = AtomicU32::new(0);
    for i in 1..=12 {
        println!("\nRequest {}:", i);

        match call.execute(|| fetch_inventory(&calls)).await {
            Ok(snapshot) => println!("Call succeeded with result: {}", snapshot),
            Err(ResilienceError::Open { retry_after }) => {
                println!("Circuit is open, retry after {:?}", retry_after);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(err) => println!("Call failed: {}", err),
        }

        println!(
            "Current state: {:?}, consecutive failures: {}",
            call.current_state(),
            call.breaker().failure_count()
        );
    }
}
