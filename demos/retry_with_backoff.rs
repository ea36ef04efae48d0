//! # Example: retry_with_backoff
//!
//! Demonstrates how a [`Resource`] retries a failing fetcher according to its
//! [`RetryConfig`] before committing the value.
//!
//! The fetcher fails twice with a transient error, then succeeds. Every
//! scheduled retry is printed from the event bus.
//!
//! ## Flow
//! ```text
//! Resource::load()
//!   ├─► LoadStarted(generation=1)
//!   ├─► attempt 1 → Err("backend (unavailable)")
//!   ├─► RetryScheduled{delay=100ms}
//!   ├─► attempt 2 → Err("backend (unavailable)")
//!   ├─► RetryScheduled{delay≈200ms}
//!   ├─► attempt 3 → Ok(42)
//!   └─► LoadSucceeded
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example retry_with_backoff
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use loadvisor::{
    EventKind, FetchError, FetchFn, FetcherRef, JitterPolicy, LoadOptions, Resource, ResourceConfig, RetryConfig,
};
use tokio_util::sync::CancellationToken;

static CALLS: AtomicU32 = AtomicU32::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Retry budget: 3 retries, 100ms doubling, equal jitter
    let retry = RetryConfig {
        max_retries: 3,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(2),
        backoff_factor: 2.0,
        jitter: JitterPolicy::Equal,
        ..RetryConfig::default()
    };

    // 2. Resource with that policy (rejected if the curve is malformed)
    let cfg = ResourceConfig {
        retry,
        ..ResourceConfig::named("orders")
    };
    let orders: Resource<u32> = Resource::try_new(cfg)?;

    // 3. Print retry events as they happen
    let mut events = orders.bus().subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            match ev.kind {
                EventKind::RetryScheduled => println!(
                    "[bus] retry #{} in {}ms ({})",
                    ev.attempt.unwrap_or_default(),
                    ev.delay_ms.unwrap_or_default(),
                    ev.reason.as_deref().unwrap_or_default()
                ),
                EventKind::LoadSucceeded => println!("[bus] load succeeded"),
                EventKind::LoadFailed => println!("[bus] load failed"),
                _ => {}
            }
        }
    });

    // 4. Fetcher that fails twice with a retryable code
    let flaky: FetcherRef<u32> = FetchFn::arc("flaky", |ctx: CancellationToken| async move {
        let attempt = CALLS.fetch_add(1, Ordering::Relaxed) + 1;
        println!("[flaky] attempt {attempt}");

        if ctx.is_cancelled() {
            return Err(FetchError::new("cancelled"));
        }
        if attempt <= 2 {
            Err(FetchError::new("backend").with_code("unavailable"))
        } else {
            Ok(42)
        }
    });

    // 5. Load and inspect the snapshot
    let status = orders.load(flaky, LoadOptions::default()).await;
    let state = orders.snapshot();
    println!("[main] status={status:?} data={:?} retries={}", state.data, state.retry_count);

    drop(orders);
    let _ = printer.await;
    Ok(())
}
