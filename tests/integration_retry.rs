//! Retry executor and deadline integration tests
//!
//! Tests the standalone building blocks:
//! - Backoff with tag-matching failures
//! - Fatal short-circuit
//! - Delay bounds with the default jitter
//! - Deadline racing

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::*;
use loadvisor::{
    CancellableOperation, ErrorKind, FetchError, OperationError, RetryAttempt, RetryConfig, RetryExecutor,
    RetryObserver, TimeoutGuard, with_deadline,
};
use tokio_util::sync::CancellationToken;

/// Test 1: fails twice with a retryable error, then returns 42
#[tokio::test(start_paused = true)]
async fn test_backoff_then_success() {
    let calls = AtomicU32::new(0);
    let outcome = RetryExecutor::new(fast_retry())
        .run(|| async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(OperationError::from(FetchError::new("Service Unavailable")))
            } else {
                Ok(42)
            }
        })
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.value(), Some(&42));
    assert_eq!(outcome.attempts(), 3);
}

/// Test 2: a non-matching error stops after the first attempt
#[tokio::test(start_paused = true)]
async fn test_fatal_short_circuit() {
    let calls = AtomicU32::new(0);
    let outcome = RetryExecutor::new(fast_retry())
        .run(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(OperationError::from(FetchError::new("invalid argument")))
        })
        .await;

    assert_eq!(outcome.attempts(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let err = outcome.error().expect("error");
    assert_eq!(err.kind, ErrorKind::Fatal);
    assert_eq!(err.message, "invalid argument");
}

/// Test 3: the code alone can make an error retryable
#[tokio::test(start_paused = true)]
async fn test_code_matches_tag() {
    let calls = AtomicU32::new(0);
    let outcome = RetryExecutor::new(fast_retry())
        .run(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(OperationError::from(
                FetchError::new("try later").with_code("RESOURCE-EXHAUSTED"),
            ))
        })
        .await;

    assert_eq!(outcome.attempts(), 4);
    assert_eq!(outcome.kind(), Some(ErrorKind::Transient));
    assert_eq!(outcome.error().and_then(|e| e.code.as_deref()), Some("RESOURCE-EXHAUSTED"));
}

/// Test 4: every scheduled delay stays within [base, base * 1.1] and under max_delay
#[tokio::test(start_paused = true)]
async fn test_observed_delays_within_bounds() {
    let seen: Arc<Mutex<Vec<(u32, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer: RetryObserver = Arc::new(move |r: &RetryAttempt<'_>| {
        sink.lock().expect("lock").push((r.attempt, r.delay));
    });
    let config = RetryConfig {
        max_retries: 6,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(1000),
        ..RetryConfig::default()
    };

    let outcome = RetryExecutor::new(config)
        .with_observer(observer)
        .run(|| async { Err::<u32, _>(OperationError::from(FetchError::new("internal"))) })
        .await;
    assert_eq!(outcome.attempts(), 7);

    let seen = seen.lock().expect("lock").clone();
    assert_eq!(seen.len(), 6);
    for (attempt, delay) in seen {
        let base = 100.0 * 2f64.powi(attempt as i32 - 1);
        let ms = delay.as_secs_f64() * 1000.0;
        assert!(ms <= 1000.0 + 1e-6, "attempt {attempt}: {ms}ms above max");
        if base * 1.1 <= 1000.0 {
            assert!(ms + 1e-6 >= base && ms <= base * 1.1 + 1e-6, "attempt {attempt}: {ms}ms");
        }
    }
}

/// Test 5: cancelling the executor token during backoff ends the run
#[tokio::test(start_paused = true)]
async fn test_cancel_stops_retries() {
    let token = CancellationToken::new();
    let calls = AtomicU32::new(0);
    let exec = RetryExecutor::new(fast_retry()).with_cancel(token.clone());

    let (outcome, ()) = tokio::join!(
        exec.run(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(OperationError::from(FetchError::new("unavailable")))
        }),
        async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            token.cancel();
        }
    );

    assert_eq!(outcome.kind(), Some(ErrorKind::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test 6: deadline over a cancellable fetch
#[tokio::test(start_paused = true)]
async fn test_deadline_over_cancellable_fetch() {
    let parent = CancellationToken::new();
    let op = CancellableOperation::new(hanging::<u32>(), parent.clone());
    let guard = TimeoutGuard::new(Duration::from_millis(50)).with_token(parent.clone());

    let res = guard.run(op.execute()).await;
    assert_eq!(
        res,
        Err(OperationError::Timeout {
            timeout: Duration::from_millis(50)
        })
    );
    assert!(parent.is_cancelled());
}

/// Test 7: a result arriving before the deadline passes through
#[tokio::test(start_paused = true)]
async fn test_with_deadline_passes_value() {
    let op = CancellableOperation::new(delayed(7u32, Duration::from_millis(10)), CancellationToken::new());
    let res = with_deadline(op.execute(), Duration::from_millis(50)).await;
    assert_eq!(res, Ok(7));
}
